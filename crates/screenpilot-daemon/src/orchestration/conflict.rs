//! Request-time exclusivity check over target applications.

use std::collections::HashMap;

use screenpilot_core::ValidationError;

/// Verify no two slots claim the same application.
///
/// `claims` pairs each active slot's 1-based index with its resolved run
/// target. Targets are compared case-insensitively. The first repeated
/// claim rejects the batch, naming the slot that claimed it first.
pub fn check_conflicts<'a, I>(claims: I) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = (usize, &'a str)>,
{
    let mut claimed: HashMap<String, usize> = HashMap::new();
    for (slot, target) in claims {
        let key = target.trim().to_lowercase();
        if let Some(&first_slot) = claimed.get(&key) {
            return Err(ValidationError::TargetConflict {
                first_slot,
                second_slot: slot,
                app: target.trim().to_string(),
            });
        }
        claimed.insert(key, slot);
    }
    Ok(())
}
