use crate::error::{ErrorLogEntry, TimerError};
use crate::storage::{Store, StoreExt, StorageKey};

/// Append `err` to the durable error log. Best effort: a failure here is
/// traced and swallowed so it never masks the original error.
pub fn record(store: &mut dyn Store, err: &TimerError) {
    if let Err(log_err) = append(store, ErrorLogEntry::from_error(err)) {
        tracing::warn!(error = %log_err, original = %err, "could not write error log");
    }
}

fn append(store: &mut dyn Store, entry: ErrorLogEntry) -> Result<(), TimerError> {
    let mut entries = match load(store) {
        Ok(entries) => entries,
        Err(e) => {
            // keep the unreadable text inside the log that replaces it
            tracing::warn!(error = %e, "error log unreadable, starting a new one");
            let raw = store.get_raw(StorageKey::ErrorLog).unwrap_or_default().to_string();
            vec![ErrorLogEntry {
                error_kind: e.kind().to_string(),
                message: format!("Replaced unreadable error log: {e}"),
                stack_trace: raw,
            }]
        }
    };
    entries.push(entry);
    store.set(StorageKey::ErrorLog, &entries)
}

pub fn load(store: &dyn Store) -> Result<Vec<ErrorLogEntry>, TimerError> {
    Ok(store
        .get::<Vec<ErrorLogEntry>>(StorageKey::ErrorLog)?
        .unwrap_or_default())
}

pub fn clear(store: &mut dyn Store) -> Result<(), TimerError> {
    store.delete(StorageKey::ErrorLog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_record_appends() {
        let mut store = MemoryStore::new();
        record(&mut store, &TimerError::UnrecognizedAction("a".into()));
        record(&mut store, &TimerError::InvalidOperation("b".into()));

        let entries = load(&store).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].error_kind, "UnrecognizedAction");
        assert_eq!(entries[1].error_kind, "InvalidOperation");
        assert_eq!(entries[1].message, "Invalid operation: b.");
    }

    #[test]
    fn test_record_keeps_corrupt_log_text() {
        let mut store = MemoryStore::new();
        store
            .set_raw(StorageKey::ErrorLog, "{broken".to_string())
            .unwrap();

        record(&mut store, &TimerError::MissingRequiredValue("code".into()));
        let entries = load(&store).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].error_kind, "Serialization");
        assert!(entries[0].message.starts_with("Replaced unreadable error log"));
        assert_eq!(entries[0].stack_trace, "{broken");
        assert_eq!(entries[1].error_kind, "MissingRequiredValue");
    }

    #[test]
    fn test_clear() {
        let mut store = MemoryStore::new();
        record(&mut store, &TimerError::UnrecognizedAction("a".into()));
        clear(&mut store).unwrap();
        assert!(load(&store).unwrap().is_empty());
    }

    #[test]
    fn test_error_log_survives_session_clear() {
        let mut store = MemoryStore::new();
        record(&mut store, &TimerError::UnrecognizedAction("a".into()));
        store.clear_session().unwrap();
        assert_eq!(load(&store).unwrap().len(), 1);
    }
}
