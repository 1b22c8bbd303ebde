use uuid::Uuid;

/// Opaque, store-assigned identifier shared by every entity.
pub type Id = String;

/// Public sequential identifier of a message.
pub type RefId = i64;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Next message refId given the current maximum, starting at 1 for an empty collection.
pub fn next_ref_id(current_max: Option<RefId>) -> RefId {
    current_max.map_or(1, |max| max + 1)
}
