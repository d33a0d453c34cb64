//! In-memory registry of signature boxes for an editing session
//!
//! Boxes keep insertion order; display order is insertion order and no
//! other ordering is implied. `by_signer_email` is the filter the
//! signing flow uses to scope what a signer may see - the store's
//! row-level policy remains the actual enforcement layer.

use thiserror::Error;

use crate::model::SignatureBox;

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("box id already registered: {0}")]
    DuplicateId(String),
}

/// Insertion-ordered collection of signature boxes, keyed by id.
#[derive(Debug, Default, Clone)]
pub struct BoxRegistry {
    boxes: Vec<SignatureBox>,
}

impl BoxRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a box. Ids are uuid v4, so collisions are negligible, but
    /// a duplicate is rejected rather than silently shadowed.
    pub fn add(&mut self, bx: SignatureBox) -> Result<(), RegistryError> {
        if self.boxes.iter().any(|b| b.id == bx.id) {
            return Err(RegistryError::DuplicateId(bx.id));
        }
        self.boxes.push(bx);
        Ok(())
    }

    /// Remove a box if present; absent ids are a no-op, not an error.
    pub fn remove(&mut self, id: &str) {
        self.boxes.retain(|b| b.id != id);
    }

    /// Replace the box with `id` by the mutator's result, typically a
    /// geometry operation. No-op if absent.
    pub fn update<F>(&mut self, id: &str, mutate: F)
    where
        F: FnOnce(&SignatureBox) -> SignatureBox,
    {
        if let Some(bx) = self.boxes.iter_mut().find(|b| b.id == id) {
            *bx = mutate(bx);
        }
    }

    pub fn get(&self, id: &str) -> Option<&SignatureBox> {
        self.boxes.iter().find(|b| b.id == id)
    }

    /// Boxes on one page, in insertion order.
    pub fn by_page(&self, page: u32) -> Vec<&SignatureBox> {
        self.boxes.iter().filter(|b| b.page == page).collect()
    }

    /// Boxes assigned to one signer, in insertion order.
    pub fn by_signer_email(&self, email: &str) -> Vec<&SignatureBox> {
        self.boxes
            .iter()
            .filter(|b| b.signer_email == email)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignatureBox> {
        self.boxes.iter()
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::apply_drag;

    fn make_box(email: &str, page: u32, x: f64) -> SignatureBox {
        SignatureBox::new("doc-1", email, page, x, 50.0, 30.0, 3.0).unwrap()
    }

    #[test]
    fn add_and_get() {
        let mut reg = BoxRegistry::new();
        let bx = make_box("a@x.com", 1, 50.0);
        let id = bx.id.clone();
        reg.add(bx).unwrap();
        assert!(reg.get(&id).is_some());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut reg = BoxRegistry::new();
        let bx = make_box("a@x.com", 1, 50.0);
        let dup = bx.clone();
        reg.add(bx).unwrap();
        assert!(matches!(reg.add(dup), Err(RegistryError::DuplicateId(_))));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut reg = BoxRegistry::new();
        reg.add(make_box("a@x.com", 1, 50.0)).unwrap();
        reg.remove("missing");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn update_applies_geometry_op() {
        let mut reg = BoxRegistry::new();
        let bx = make_box("a@x.com", 1, 50.0);
        let id = bx.id.clone();
        reg.add(bx).unwrap();

        reg.update(&id, |b| apply_drag(b, 10.0, 0.0));
        assert_eq!(reg.get(&id).unwrap().x, 60.0);

        // Absent id: nothing happens.
        reg.update("missing", |b| apply_drag(b, 10.0, 0.0));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn by_page_preserves_insertion_order() {
        let mut reg = BoxRegistry::new();
        let first = make_box("a@x.com", 1, 20.0);
        let second = make_box("a@x.com", 2, 30.0);
        let third = make_box("a@x.com", 1, 40.0);
        let (id1, id3) = (first.id.clone(), third.id.clone());
        reg.add(first).unwrap();
        reg.add(second).unwrap();
        reg.add(third).unwrap();

        let page_one: Vec<_> = reg.by_page(1).iter().map(|b| b.id.clone()).collect();
        assert_eq!(page_one, vec![id1, id3]);
    }

    #[test]
    fn by_signer_email_filters_other_signers() {
        let mut reg = BoxRegistry::new();
        let a1 = make_box("a@x.com", 1, 20.0);
        let b1 = make_box("b@x.com", 1, 40.0);
        let a2 = make_box("a@x.com", 2, 60.0);
        let (a1_id, a2_id) = (a1.id.clone(), a2.id.clone());
        reg.add(a1).unwrap();
        reg.add(b1).unwrap();
        reg.add(a2).unwrap();

        let for_a: Vec<_> = reg
            .by_signer_email("a@x.com")
            .iter()
            .map(|b| b.id.clone())
            .collect();
        assert_eq!(for_a, vec![a1_id, a2_id]);
        assert_eq!(reg.by_signer_email("b@x.com").len(), 1);
        assert!(reg.by_signer_email("c@x.com").is_empty());
    }
}
