//! Class lists for CLIP zero-shot labeling.
//!
//! The torchvision label sets `CIFAR10`, `CIFAR100`, `STL10`, `MNIST` and
//! `FashionMNIST` are built in. Any other dataset is read from
//! `<datasets_dir>/<name>.txt`, one class per line.

use std::path::Path;

use crate::error::SetupError;

const CIFAR10: &[&str] = &[
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

const CIFAR100: &[&str] = &[
    "apple",
    "aquarium_fish",
    "baby",
    "bear",
    "beaver",
    "bed",
    "bee",
    "beetle",
    "bicycle",
    "bottle",
    "bowl",
    "boy",
    "bridge",
    "bus",
    "butterfly",
    "camel",
    "can",
    "castle",
    "caterpillar",
    "cattle",
    "chair",
    "chimpanzee",
    "clock",
    "cloud",
    "cockroach",
    "couch",
    "crab",
    "crocodile",
    "cup",
    "dinosaur",
    "dolphin",
    "elephant",
    "flatfish",
    "forest",
    "fox",
    "girl",
    "hamster",
    "house",
    "kangaroo",
    "keyboard",
    "lamp",
    "lawn_mower",
    "leopard",
    "lion",
    "lizard",
    "lobster",
    "man",
    "maple_tree",
    "motorcycle",
    "mountain",
    "mouse",
    "mushroom",
    "oak_tree",
    "orange",
    "orchid",
    "otter",
    "palm_tree",
    "pear",
    "pickup_truck",
    "pine_tree",
    "plain",
    "plate",
    "poppy",
    "porcupine",
    "possum",
    "rabbit",
    "raccoon",
    "ray",
    "road",
    "rocket",
    "rose",
    "sea",
    "seal",
    "shark",
    "shrew",
    "skunk",
    "skyscraper",
    "snail",
    "snake",
    "spider",
    "squirrel",
    "streetcar",
    "sunflower",
    "sweet_pepper",
    "table",
    "tank",
    "telephone",
    "television",
    "tiger",
    "tractor",
    "train",
    "trout",
    "tulip",
    "turtle",
    "wardrobe",
    "whale",
    "willow_tree",
    "wolf",
    "woman",
    "worm",
];

const STL10: &[&str] = &[
    "airplane",
    "bird",
    "car",
    "cat",
    "deer",
    "dog",
    "horse",
    "monkey",
    "ship",
    "truck",
];

const MNIST: &[&str] = &[
    "0 - zero",
    "1 - one",
    "2 - two",
    "3 - three",
    "4 - four",
    "5 - five",
    "6 - six",
    "7 - seven",
    "8 - eight",
    "9 - nine",
];

const FASHION_MNIST: &[&str] = &[
    "T-shirt/top",
    "Trouser",
    "Pullover",
    "Dress",
    "Coat",
    "Sandal",
    "Shirt",
    "Sneaker",
    "Bag",
    "Ankle boot",
];

fn builtin(name: &str) -> Option<&'static [&'static str]> {
    match name {
        "CIFAR10" => Some(CIFAR10),
        "CIFAR100" => Some(CIFAR100),
        "STL10" => Some(STL10),
        "MNIST" => Some(MNIST),
        "FashionMNIST" => Some(FASHION_MNIST),
        _ => None,
    }
}

/// Resolve a dataset name to its class list.
pub fn dataset_classes(name: &str, datasets_dir: &Path) -> Result<Vec<String>, SetupError> {
    if let Some(classes) = builtin(name) {
        return Ok(classes.iter().map(|c| c.to_string()).collect());
    }

    // Names come from the command line; keep them inside the datasets dir.
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(SetupError::UnknownDataset(name.to_string()));
    }

    let path = datasets_dir.join(format!("{name}.txt"));
    let content = std::fs::read_to_string(&path)
        .map_err(|_| SetupError::UnknownDataset(name.to_string()))?;
    let classes: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();

    if classes.is_empty() {
        return Err(SetupError::UnknownDataset(name.to_string()));
    }
    Ok(classes)
}

/// Split a `--categories` value on commas.
pub fn parse_categories(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_cifar10() {
        let classes = dataset_classes("CIFAR10", Path::new("/nonexistent")).unwrap();
        assert_eq!(classes.len(), 10);
        assert_eq!(classes[0], "airplane");
    }

    #[test]
    fn test_builtin_cifar100() {
        let classes = dataset_classes("CIFAR100", Path::new("/nonexistent")).unwrap();
        assert_eq!(classes.len(), 100);
        assert_eq!(classes[0], "apple");
        assert_eq!(classes[99], "worm");
        assert!(classes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_other_builtins() {
        for name in ["STL10", "MNIST", "FashionMNIST"] {
            let classes = dataset_classes(name, Path::new("/nonexistent")).unwrap();
            assert_eq!(classes.len(), 10, "{name}");
        }
        let fashion = dataset_classes("FashionMNIST", Path::new("/nonexistent")).unwrap();
        assert_eq!(fashion[9], "Ankle boot");
    }

    #[test]
    fn test_dataset_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pets.txt"), "cat\n\n dog \nhamster\n").unwrap();
        let classes = dataset_classes("pets", dir.path()).unwrap();
        assert_eq!(classes, vec!["cat", "dog", "hamster"]);
    }

    #[test]
    fn test_unknown_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let err = dataset_classes("ImageNet", dir.path()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid dataset type: ImageNet");
        assert!(dataset_classes("../etc/passwd", dir.path()).is_err());
    }

    #[test]
    fn test_parse_categories() {
        assert_eq!(parse_categories("cat, dog,,bird"), vec!["cat", "dog", "bird"]);
        assert!(parse_categories("").is_empty());
    }
}
