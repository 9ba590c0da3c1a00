// 👥 Person Directory - identity resolution + deduplication
//
// "Ana Gómez", " ana   gómez " and "ANA GÓMEZ" are the same counterparty.
// The store's unique index on the name key is the source of truth: creation is
// optimistic and a duplicate-key failure turns into a second lookup.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{DomainError, Result};
use crate::model::{clean_name, make_name_key, NewPerson, Person, PersonId, PersonSummary};
use crate::store::{Store, TextNeedle};

/// Default cap for the admin person search
pub const SEARCH_LIMIT: usize = 8;

/// Outcome of [`PersonDirectory::backfill_name_keys`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackfillReport {
    pub scanned: usize,
    pub updated: usize,
    /// Persons whose recomputed key already belongs to someone else
    pub collisions: Vec<(PersonId, String)>,
}

#[derive(Clone)]
pub struct PersonDirectory {
    store: Arc<dyn Store>,
}

impl PersonDirectory {
    pub fn new(store: Arc<dyn Store>) -> Self {
        PersonDirectory { store }
    }

    pub fn find(&self, id: PersonId) -> Result<Person> {
        self.store
            .find_person(id)?
            .ok_or_else(|| DomainError::NotFound(format!("Person {} not found", id)))
    }

    /// Lookup only; never creates.
    pub fn find_by_legal_id(&self, legal_id: &str) -> Result<Option<Person>> {
        let legal_id = legal_id.trim();
        if legal_id.is_empty() {
            return Ok(None);
        }
        Ok(self.store.find_person_by_legal_id(legal_id)?)
    }

    /// Find or create the person for a free-text name.
    ///
    /// The stored name keeps its case but has its whitespace cleaned.
    pub fn resolve_by_name(&self, raw_name: &str) -> Result<Person> {
        let name = clean_name(raw_name);
        if name.is_empty() {
            return Err(DomainError::Validation("Name is required".to_string()));
        }

        let name_key = make_name_key(&name);

        if let Some(existing) = self.store.find_person_by_name_key(&name_key)? {
            debug!("Resolved '{}' to person {}", name, existing.id);
            return Ok(existing);
        }

        let new_person = NewPerson {
            legal_id: None,
            name,
            name_key: name_key.clone(),
            phone: None,
        };

        match self.store.insert_person(&new_person) {
            Ok(person) => {
                info!("Created person {} '{}'", person.id, person.name);
                Ok(person)
            }
            Err(err) if err.is_duplicate_key() => {
                debug!("Lost create race for name key '{}', re-reading", name_key);
                self.store
                    .find_person_by_name_key(&name_key)?
                    .ok_or_else(|| {
                        DomainError::Internal(format!(
                            "name key '{}' rejected as duplicate but not found",
                            name_key
                        ))
                    })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Find or create the person holding a legal id, refreshing name and phone
    /// to the supplied values.
    ///
    /// A person already holding the same name key but no legal id is adopted.
    pub fn resolve_by_legal_id(
        &self,
        legal_id: &str,
        display_name: &str,
        phone: Option<&str>,
    ) -> Result<Person> {
        let legal_id = legal_id.trim();
        if legal_id.is_empty() {
            return Err(DomainError::Validation("Legal id is required".to_string()));
        }

        let name = clean_name(display_name);
        if name.is_empty() {
            return Err(DomainError::Validation("Name is required".to_string()));
        }

        let name_key = make_name_key(&name);
        let phone = phone
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        // Second pass only after losing an insert race
        for _ in 0..2 {
            if let Some(existing) = self.store.find_person_by_legal_id(legal_id)? {
                return self.refresh(existing, &name, &name_key, phone.as_deref());
            }

            if let Some(holder) = self.store.find_person_by_name_key(&name_key)? {
                if let Some(other) = &holder.legal_id {
                    return Err(DomainError::Conflict(format!(
                        "'{}' is already registered under legal id {}",
                        holder.name, other
                    )));
                }

                info!("Attaching legal id {} to person {}", legal_id, holder.id);
                let adopted = Person {
                    legal_id: Some(legal_id.to_string()),
                    ..holder
                };
                return self.refresh_forced(adopted, &name, &name_key, phone.as_deref());
            }

            let new_person = NewPerson {
                legal_id: Some(legal_id.to_string()),
                name: name.clone(),
                name_key: name_key.clone(),
                phone: phone.clone(),
            };

            match self.store.insert_person(&new_person) {
                Ok(person) => {
                    info!("Created person {} with legal id {}", person.id, legal_id);
                    return Ok(person);
                }
                Err(err) if err.is_duplicate_key() => {
                    debug!("Lost create race for legal id {}, re-reading", legal_id);
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(DomainError::Internal(format!(
            "could not settle identity for legal id {}",
            legal_id
        )))
    }

    fn refresh(
        &self,
        person: Person,
        name: &str,
        name_key: &str,
        phone: Option<&str>,
    ) -> Result<Person> {
        let phone_unchanged = phone.is_none() || person.phone.as_deref() == phone;
        if person.name == name && phone_unchanged {
            return Ok(person);
        }
        self.refresh_forced(person, name, name_key, phone)
    }

    /// Write the supplied values; an absent phone keeps the stored one.
    fn refresh_forced(
        &self,
        mut person: Person,
        name: &str,
        name_key: &str,
        phone: Option<&str>,
    ) -> Result<Person> {
        person.name = name.to_string();
        person.name_key = name_key.to_string();
        if let Some(phone) = phone {
            person.phone = Some(phone.to_string());
        }

        match self.store.update_person(&person) {
            Ok(()) => {
                debug!("Refreshed person {}", person.id);
                Ok(person)
            }
            Err(err) if err.is_duplicate_key() => Err(DomainError::Conflict(format!(
                "Another person is already registered as '{}'",
                name
            ))),
            Err(err) => Err(err.into()),
        }
    }

    /// Case-insensitive substring match on name or phone, ordered by name.
    pub fn search(&self, term: &str, limit: usize) -> Result<Vec<PersonSummary>> {
        match TextNeedle::new(term) {
            Some(needle) => Ok(self.store.search_persons(&needle, limit)?),
            None => Ok(Vec::new()),
        }
    }

    /// Recompute every stored name key from the display name.
    pub fn backfill_name_keys(&self) -> Result<BackfillReport> {
        let mut report = BackfillReport::default();

        for person in self.store.all_persons()? {
            report.scanned += 1;

            let fresh_key = make_name_key(&person.name);
            if fresh_key == person.name_key {
                continue;
            }

            let updated = Person {
                name_key: fresh_key.clone(),
                ..person
            };

            match self.store.update_person(&updated) {
                Ok(()) => report.updated += 1,
                Err(err) if err.is_duplicate_key() => {
                    warn!(
                        "Person {} collides on name key '{}', left unchanged",
                        updated.id, fresh_key
                    );
                    report.collisions.push((updated.id, fresh_key));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(report)
    }
}
