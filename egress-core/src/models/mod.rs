pub mod proxies;
pub mod shops;

/// Capability for mutation payloads that carry operator attribution.
/// The store layer invokes the relevant setter before a write when it
/// knows the acting operator; payloads override only the method that
/// matches the fields they record.
pub trait Auditable {
    fn set_created_by(&mut self, _operator: i32) {}
    fn set_updated_by(&mut self, _operator: i32) {}
}
