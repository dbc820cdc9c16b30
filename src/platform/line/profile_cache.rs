use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::platform::line::api::{Contact, LineApi};

/// Read-through cache of sender profiles.
///
/// Entries never expire: a display name change on the platform is not seen
/// until the process restarts. Owned by the dispatcher, so no locking.
pub struct ProfileCache {
    api: Arc<dyn LineApi>,
    contacts: HashMap<String, Arc<Contact>>,
}

impl ProfileCache {
    pub fn new(api: Arc<dyn LineApi>) -> Self {
        Self {
            api,
            contacts: HashMap::new(),
        }
    }

    /// Return the cached profile for `mid`, fetching it on first use.
    pub async fn lookup(&mut self, mid: &str) -> Result<Arc<Contact>> {
        if let Some(contact) = self.contacts.get(mid) {
            return Ok(Arc::clone(contact));
        }

        let contact = self
            .api
            .get_user_profile(mid)
            .await?
            .into_iter()
            .next()
            .with_context(|| format!("LINE returned no profile for {}", mid))?;
        let contact = Arc::new(contact);

        // The returned mid is authoritative. Alias the queried one too so a
        // mismatch doesn't turn into a fetch on every message.
        if contact.mid != mid {
            warn!(
                "Profile lookup for {} returned contact {}; caching under both",
                mid, contact.mid
            );
            self.contacts.insert(mid.to_string(), Arc::clone(&contact));
        }
        self.contacts
            .insert(contact.mid.clone(), Arc::clone(&contact));

        debug!("Cached profile {} ({})", contact.mid, contact.display_name);
        Ok(contact)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.contacts.len()
    }
}
