use crate::core::{CollectionElement, Result};
use crate::session::IdentityResolver;
use std::collections::HashSet;

/// Elements of `old` no longer referenced by `current`, matched by persistent
/// identifier rather than by value.
///
/// Transient elements of `current` are ignored, so an unsaved replacement does
/// not hide the deletion of the row it replaces. With duplicate identifiers in
/// a plain bag the match cannot tell which physical row went away; every old
/// element sharing a surviving identifier is kept.
pub fn get_orphans<E, R>(
    old: Vec<E>,
    current: &[E],
    entity_name: &str,
    resolver: &R,
) -> Result<Vec<E>>
where
    E: CollectionElement,
    R: IdentityResolver + ?Sized,
{
    // no new elements, the old ones are all orphans
    if current.is_empty() {
        return Ok(old);
    }
    if old.is_empty() {
        return Ok(old);
    }

    let mut current_ids = HashSet::with_capacity(current.len());
    let mut current_saving = HashSet::new();
    for element in current {
        let value = element.to_value();
        if value.is_null() || resolver.is_transient(entity_name, &value)? {
            continue;
        }
        if resolver.is_saving(entity_name, &value) {
            current_saving.insert(value);
        } else if let Some(id) = resolver.identifier(entity_name, &value)? {
            current_ids.insert(id);
        }
    }

    let mut orphans = Vec::new();
    for element in old {
        let value = element.to_value();
        if current_saving.contains(&value) {
            continue;
        }
        match resolver.identifier(entity_name, &value)? {
            Some(id) if current_ids.contains(&id) => {}
            _ => orphans.push(element),
        }
    }

    Ok(orphans)
}

/// Removes the first element whose identifier equals the identifier of `entity`.
///
/// Does nothing for transient entities. Returns whether an element was removed.
pub fn identity_remove<E, R>(
    list: &mut Vec<E>,
    entity: &E,
    entity_name: &str,
    resolver: &R,
) -> Result<bool>
where
    E: CollectionElement,
    R: IdentityResolver + ?Sized,
{
    let value = entity.to_value();
    if value.is_null() || resolver.is_transient(entity_name, &value)? {
        return Ok(false);
    }
    let Some(id) = resolver.identifier(entity_name, &value)? else {
        return Ok(false);
    };

    let mut position = None;
    for (i, candidate) in list.iter().enumerate() {
        if resolver.identifier(entity_name, &candidate.to_value())?.as_ref() == Some(&id) {
            position = Some(i);
            break;
        }
    }

    match position {
        Some(i) => {
            list.remove(i);
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;

    /// Entities are `[id, name]`; a `Null` id means transient.
    struct ListResolver {
        saving: Vec<Value>,
    }

    impl IdentityResolver for ListResolver {
        fn is_transient(&self, _entity_name: &str, entity: &Value) -> Result<bool> {
            Ok(self.identifier("Child", entity)?.is_none())
        }

        fn identifier(&self, _entity_name: &str, entity: &Value) -> Result<Option<Value>> {
            Ok(entity
                .as_list()
                .and_then(|fields| fields.first())
                .filter(|id| !id.is_null())
                .cloned())
        }

        fn is_saving(&self, _entity_name: &str, entity: &Value) -> bool {
            self.saving.contains(entity)
        }
    }

    fn child(id: Option<i64>, name: &str) -> Value {
        Value::List(vec![id.map_or(Value::Null, Value::Integer), Value::from(name)])
    }

    fn resolver() -> ListResolver {
        ListResolver { saving: Vec::new() }
    }

    #[test]
    fn test_orphan_by_identifier() {
        let old = vec![child(Some(1), "a"), child(Some(2), "b")];
        // same id, different state: still the same row
        let current = vec![child(Some(2), "b-renamed")];
        let orphans = get_orphans(old, &current, "Child", &resolver()).unwrap();
        assert_eq!(orphans, vec![child(Some(1), "a")]);
    }

    #[test]
    fn test_short_circuits() {
        let old = vec![child(Some(1), "a")];
        assert_eq!(
            get_orphans(old.clone(), &[], "Child", &resolver()).unwrap(),
            old
        );
        assert!(
            get_orphans(Vec::new(), &old, "Child", &resolver())
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_transient_replacement_does_not_mask_deletion() {
        let old = vec![child(Some(1), "a")];
        let current = vec![child(None, "a")];
        let orphans = get_orphans(old.clone(), &current, "Child", &resolver()).unwrap();
        assert_eq!(orphans, old);
    }

    #[test]
    fn test_saving_elements_are_never_orphans() {
        let saving = child(Some(5), "new");
        let resolver = ListResolver {
            saving: vec![saving.clone()],
        };
        let old = vec![saving.clone(), child(Some(1), "a")];
        let current = vec![saving];
        let orphans = get_orphans(old, &current, "Child", &resolver).unwrap();
        assert_eq!(orphans, vec![child(Some(1), "a")]);
    }

    #[test]
    fn test_identity_remove_matches_first_identifier() {
        let mut list = vec![child(Some(1), "a"), child(Some(2), "b"), child(Some(2), "c")];
        let removed =
            identity_remove(&mut list, &child(Some(2), "other"), "Child", &resolver()).unwrap();
        assert!(removed);
        assert_eq!(list, vec![child(Some(1), "a"), child(Some(2), "c")]);

        let removed =
            identity_remove(&mut list, &child(None, "a"), "Child", &resolver()).unwrap();
        assert!(!removed);
        assert_eq!(list.len(), 2);
    }
}
