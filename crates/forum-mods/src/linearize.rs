//! C3 linearization of type hierarchies
//!
//! Member lookup on a composed type walks this order front to back, so the
//! first base listed wins a name collision and a shared root comes after every
//! type deriving from it.

use crate::errors::ModError;
use crate::types::TypeRef;
use std::sync::Arc;

/// Linearize `ty` and its ancestors, `ty` first
pub fn linearize(ty: &TypeRef) -> Result<Vec<TypeRef>, ModError> {
    let mut sequences = Vec::with_capacity(ty.bases().len() + 1);
    for base in ty.bases() {
        sequences.push(linearize(base)?);
    }
    sequences.push(ty.bases().to_vec());

    let mut result = vec![ty.clone()];
    merge(sequences, &mut result)
        .ok_or_else(|| ModError::InconsistentHierarchy(ty.name().to_string()))?;
    Ok(result)
}

fn merge(mut sequences: Vec<Vec<TypeRef>>, result: &mut Vec<TypeRef>) -> Option<()> {
    loop {
        sequences.retain(|seq| !seq.is_empty());
        if sequences.is_empty() {
            return Some(());
        }

        // A good head appears in no other sequence's tail
        let head = sequences
            .iter()
            .map(|seq| &seq[0])
            .find(|head| {
                !sequences
                    .iter()
                    .any(|seq| seq[1..].iter().any(|ty| Arc::ptr_eq(ty, head)))
            })?
            .clone();

        for seq in &mut sequences {
            if Arc::ptr_eq(&seq[0], &head) {
                seq.remove(0);
            }
        }
        result.push(head);
    }
}
