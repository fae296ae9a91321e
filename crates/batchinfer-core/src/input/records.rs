//! Line-oriented reader for text classification input.
//!
//! Each line is a JSON object mapping item ids to the text to classify.
//! One item per line is recommended, but any number is accepted. A blank
//! line is not valid JSON and is reported like any other unparsable line.

use std::io::BufRead;

/// A line that could not be parsed as a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct LineError {
    /// 1-based line number
    pub line: usize,
    pub message: String,
}

/// Iterates over `(id, text)` items, one input line at a time.
pub struct TextItemReader<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> TextItemReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for TextItemReader<R> {
    type Item = Result<Vec<(String, String)>, LineError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        self.line += 1;
        let parsed = match self.reader.read_line(&mut self.buf) {
            Ok(0) => return None,
            Ok(_) => parse_line(self.buf.trim()),
            Err(e) => Err(e.to_string()),
        };
        Some(parsed.map_err(|message| LineError {
            line: self.line,
            message,
        }))
    }
}

fn parse_line(line: &str) -> Result<Vec<(String, String)>, String> {
    let value: serde_json::Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
    let serde_json::Value::Object(map) = value else {
        return Err("expected a JSON object of id -> text".to_string());
    };

    Ok(map
        .into_iter()
        .map(|(id, text)| {
            let text = match text {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (id, text)
        })
        .collect())
}
