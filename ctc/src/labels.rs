use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

/// 61 TIMIT phones, indexed in mapping-file order.
pub const TIMIT_PHONES: [&str; 61] = [
    "aa", "ae", "ah", "ao", "aw", "ax", "ax-h", "axr", "ay", "b", "bcl", "ch", "d", "dcl", "dh",
    "dx", "eh", "el", "em", "en", "eng", "epi", "er", "ey", "f", "g", "gcl", "h#", "hh", "hv",
    "ih", "ix", "iy", "jh", "k", "kcl", "l", "m", "n", "ng", "nx", "ow", "oy", "p", "pau", "pcl",
    "q", "r", "s", "sh", "t", "tcl", "th", "uh", "uw", "ux", "v", "w", "y", "z", "zh",
];

pub const NUM_CHARACTERS: usize = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelType {
    Phone,
    Character,
}

impl LabelType {
    pub const ALL: [LabelType; 2] = [LabelType::Phone, LabelType::Character];

    /// Number of output classes, not counting the CTC blank.
    pub fn num_classes(&self) -> usize {
        match self {
            LabelType::Phone => TIMIT_PHONES.len(),
            LabelType::Character => NUM_CHARACTERS,
        }
    }
}

impl fmt::Display for LabelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelType::Phone => write!(f, "phone"),
            LabelType::Character => write!(f, "character"),
        }
    }
}

impl FromStr for LabelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "phone" => Ok(LabelType::Phone),
            "character" => Ok(LabelType::Character),
            _ => Err(format!("Unknown label type: {}", s)),
        }
    }
}

/// Renders label indices as letters, `0` being `a`.
pub fn num2alpha(labels: &[u32]) -> String {
    labels
        .iter()
        .map(|&label| {
            if (label as usize) < NUM_CHARACTERS {
                (b'a' + label as u8) as char
            } else {
                '?'
            }
        })
        .collect()
}

/// Index to phone lookup, either the built-in TIMIT table or a mapping file.
#[derive(Debug, Clone)]
pub struct PhoneMap {
    phones: Vec<String>,
}

impl Default for PhoneMap {
    fn default() -> Self {
        Self {
            phones: TIMIT_PHONES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl PhoneMap {
    /// Loads a mapping file with one `phone index` pair per line.
    pub fn load(path: &Path) -> io::Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> io::Result<Self> {
        let mut entries = Vec::new();

        for (line_number, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let mut parts = line.split_whitespace();
            let (Some(phone), Some(index)) = (parts.next(), parts.next()) else {
                return Err(invalid_line(line_number, line));
            };
            let index: usize = index.parse().map_err(|_| invalid_line(line_number, line))?;
            entries.push((index, phone.to_string()));
        }

        entries.sort_by_key(|(index, _)| *index);

        let mut phones = Vec::with_capacity(entries.len());
        for (expected, (index, phone)) in entries.into_iter().enumerate() {
            if index != expected {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Phone map is missing index {}", expected),
                ));
            }
            phones.push(phone);
        }

        Ok(Self { phones })
    }

    pub fn len(&self) -> usize {
        self.phones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phones.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&str> {
        self.phones.get(index as usize).map(String::as_str)
    }

    pub fn num2phone(&self, labels: &[u32]) -> String {
        labels
            .iter()
            .map(|&label| self.get(label).unwrap_or("?"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn invalid_line(line_number: usize, line: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("Invalid phone map line {}: {:?}", line_number + 1, line),
    )
}

/// Turns label sequences into text for progress output.
pub struct LabelRenderer {
    label_type: LabelType,
    phones: PhoneMap,
}

impl LabelRenderer {
    pub fn new(label_type: LabelType, phones: PhoneMap) -> Self {
        Self { label_type, phones }
    }

    pub fn render(&self, labels: &[u32]) -> String {
        match self.label_type {
            LabelType::Character => num2alpha(labels),
            LabelType::Phone => self.phones.num2phone(labels),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_num_classes() {
        assert_eq!(LabelType::Phone.num_classes(), 61);
        assert_eq!(LabelType::Character.num_classes(), 26);
    }

    #[test]
    fn test_label_type_round_trip_names() {
        for label_type in LabelType::ALL {
            assert_eq!(label_type.to_string().parse::<LabelType>(), Ok(label_type));
        }
        assert!("word".parse::<LabelType>().is_err());
    }

    #[test]
    fn test_num2alpha() {
        assert_eq!(num2alpha(&[0, 1, 2, 25]), "abcz");
        assert_eq!(num2alpha(&[7, 4, 11, 11, 14]), "hello");
        assert_eq!(num2alpha(&[26]), "?");
        assert_eq!(num2alpha(&[]), "");
    }

    #[test]
    fn test_builtin_phones() {
        let map = PhoneMap::default();
        assert_eq!(map.len(), 61);
        assert_eq!(map.num2phone(&[27, 28, 0]), "h# hh aa");
        assert_eq!(map.num2phone(&[99]), "?");
    }

    #[test]
    fn test_phone_map_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sil 2").unwrap();
        writeln!(file, "aa 0").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "b 1").unwrap();

        let map = PhoneMap::load(file.path()).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.num2phone(&[0, 1, 2]), "aa b sil");
    }

    #[test]
    fn test_phone_map_rejects_gaps_and_garbage() {
        assert!(PhoneMap::parse("aa 0\nb 2\n").is_err());
        assert!(PhoneMap::parse("aa\n").is_err());
        assert!(PhoneMap::parse("aa x\n").is_err());
    }

    #[test]
    fn test_renderer() {
        let renderer = LabelRenderer::new(LabelType::Character, PhoneMap::default());
        assert_eq!(renderer.render(&[18, 7, 4]), "she");

        let renderer = LabelRenderer::new(LabelType::Phone, PhoneMap::default());
        assert_eq!(renderer.render(&[48, 49]), "s sh");
    }
}
