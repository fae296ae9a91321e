//! Input handling: folder listing, image loading, and the line and file
//! formats the commands read.

pub mod decode;
pub mod discovery;
pub mod labels;
pub mod prompts;
pub mod records;

pub use decode::{ImageLoader, LoadedImage};
pub use discovery::{file_name, list_folder};
pub use labels::LabelSet;
pub use prompts::{load_prompts_file, single_prompt, PromptItem};
pub use records::{LineError, TextItemReader};
