use crc32fast::Hasher;

/// Generate a stable document id from a manuscript identifier using CRC32
pub fn get_document_id(manuscript_id: &str) -> String {
    let mut buff = String::from(manuscript_id);
    if !manuscript_id.starts_with("manuscript://") {
        buff = format!("manuscript://{}", buff);
    }

    let mut hasher = Hasher::new();
    hasher.update(buff.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Object types that receive generated ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Footnote,
    FootnotesElement,
    Section,
    Paragraph,
    TableElementFooter,
    Backmatter,
    Change,
}

impl ObjectType {
    pub fn prefix(&self) -> &'static str {
        match self {
            ObjectType::Footnote => "MPFootnote",
            ObjectType::FootnotesElement => "MPFootnotesElement",
            ObjectType::Section => "MPSection",
            ObjectType::Paragraph => "MPParagraphElement",
            ObjectType::TableElementFooter => "MPTableElementFooter",
            ObjectType::Backmatter => "MPBackmatter",
            ObjectType::Change => "MPChange",
        }
    }
}

/// Sequential id generator for nodes created while editing a manuscript
#[derive(Debug, Clone)]
pub struct IdGenerator {
    seed: String, // Document id (CRC32)
    count: u32,   // Sequential counter
}

impl IdGenerator {
    pub fn new(manuscript_id: &str) -> Self {
        Self {
            seed: get_document_id(manuscript_id),
            count: 0,
        }
    }

    pub fn from_seed(seed: String) -> Self {
        Self { seed, count: 0 }
    }

    /// Generate the next id for an object type, e.g. `MPFootnote:1a2b3c-4`
    pub fn new_id(&mut self, object_type: ObjectType) -> String {
        self.count += 1;
        format!("{}:{}-{}", object_type.prefix(), self.seed, self.count)
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_generation() {
        let id1 = get_document_id("MPManuscript:1");
        let id2 = get_document_id("manuscript://MPManuscript:1");

        assert_eq!(id1, id2);
        assert_ne!(id1, get_document_id("MPManuscript:2"));
    }

    #[test]
    fn test_sequential_ids() {
        let mut ids = IdGenerator::from_seed("abc".to_string());
        assert_eq!(ids.new_id(ObjectType::Footnote), "MPFootnote:abc-1");
        assert_eq!(ids.new_id(ObjectType::Section), "MPSection:abc-2");
    }
}
