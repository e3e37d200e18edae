//! Identifier allocation for documents and signature slots

use uuid::Uuid;

/// Source of opaque, unique identifiers
pub trait IdAllocator: Send + Sync {
    fn allocate(&self) -> String;
}

/// Random UUID v4 identifiers
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidAllocator;

impl IdAllocator for UuidAllocator {
    fn allocate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_ids_are_unique() {
        let a = UuidAllocator.allocate();
        let b = UuidAllocator.allocate();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }
}
