// ⚖️ Sheet Aggregate Manager
// Creates weighing sheets, appends cattle entries and keeps the derived
// total/average equal to the entry set.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::access::Caller;
use crate::directory::PersonDirectory;
use crate::error::{DomainError, Result, StoreError};
use crate::model::{
    clean_name, CattleEntry, EntryInput, NewEntry, NewSheet, Person, PersonId, SheetDetail, SheetId,
    SheetTotals, WeighingSheet,
};
use crate::store::Store;

/// How a seller or buyer is identified when a sheet is created.
#[derive(Debug, Clone, PartialEq)]
pub enum CounterpartyRef {
    /// An already resolved person
    ById(PersonId),
    /// Lookup only; an unknown legal id is NotFound
    ByLegalId(String),
    /// Find or create by normalized name
    ByName(String),
}

/// Result of appending an entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendedEntry {
    pub entry: CattleEntry,
    pub updated_sheet: WeighingSheet,
}

#[derive(Clone)]
pub struct SheetManager {
    store: Arc<dyn Store>,
    directory: PersonDirectory,
}

impl SheetManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        SheetManager {
            directory: PersonDirectory::new(store.clone()),
            store,
        }
    }

    pub fn resolve_counterparty(&self, reference: &CounterpartyRef) -> Result<Person> {
        match reference {
            CounterpartyRef::ById(id) => self.directory.find(*id),
            CounterpartyRef::ByLegalId(legal_id) => self
                .directory
                .find_by_legal_id(legal_id)?
                .ok_or_else(|| {
                    DomainError::NotFound(format!("No person with legal id '{}'", legal_id.trim()))
                }),
            CounterpartyRef::ByName(name) => self.directory.resolve_by_name(name),
        }
    }

    pub fn create_sheet(
        &self,
        seller: &CounterpartyRef,
        buyer: &CounterpartyRef,
        caller: &Caller,
    ) -> Result<SheetDetail> {
        if !caller.can_mutate_cattle() {
            return Err(DomainError::Forbidden(
                "Only administrators can create sheets".to_string(),
            ));
        }

        // Refuse blank names before anything is created
        for reference in [seller, buyer] {
            if let CounterpartyRef::ByName(name) = reference {
                if clean_name(name).is_empty() {
                    return Err(DomainError::Validation("Name is required".to_string()));
                }
            }
        }

        // Lookups that never create run first, so a miss leaves no person behind
        let (seller, buyer) = match seller {
            CounterpartyRef::ByName(_) => {
                let buyer = self.resolve_counterparty(buyer)?;
                (self.resolve_counterparty(seller)?, buyer)
            }
            _ => {
                let seller = self.resolve_counterparty(seller)?;
                (seller, self.resolve_counterparty(buyer)?)
            }
        };

        let sheet = self.store.insert_sheet(&NewSheet {
            seller_id: seller.id,
            buyer_id: buyer.id,
            created_by: caller.subject_id,
            created_at: Utc::now(),
        })?;

        info!(
            "Created sheet {} (seller {}, buyer {})",
            sheet.id, seller.id, buyer.id
        );

        Ok(SheetDetail {
            sheet,
            seller,
            buyer,
            entries: Vec::new(),
        })
    }

    /// Append one animal and recompute the sheet totals from every entry.
    pub fn add_entry(
        &self,
        sheet_id: SheetId,
        input: EntryInput,
        caller: &Caller,
    ) -> Result<AppendedEntry> {
        if !caller.can_mutate_cattle() {
            return Err(DomainError::Forbidden(
                "Only administrators can add cattle".to_string(),
            ));
        }

        let weight = input.weight.parse()?;
        let entry = NewEntry {
            tag_number: input.tag_number,
            cattle_type: input.cattle_type,
            sex: input.sex,
            weight,
            mark: input.mark.filter(|m| !m.trim().is_empty()),
        };

        let appended = match self.store.append_entry(sheet_id, &entry) {
            Ok(appended) => appended,
            Err(StoreError::TotalOutOfRange(_)) => {
                return Err(DomainError::Validation(format!(
                    "Weight {} pushes the sheet total out of range",
                    weight
                )))
            }
            Err(err) => return Err(err.into()),
        };
        let (entry, updated_sheet) = appended
            .ok_or_else(|| DomainError::NotFound(format!("Sheet {} not found", sheet_id)))?;

        info!(
            "Added entry {} to sheet {} ({} kg, total {:?})",
            entry.id, sheet_id, entry.weight, updated_sheet.total_weight
        );

        Ok(AppendedEntry {
            entry,
            updated_sheet,
        })
    }

    /// Sheet with counterparties and entries, if the caller may see it.
    pub fn get_sheet(&self, sheet_id: SheetId, caller: &Caller) -> Result<SheetDetail> {
        let mut sheet = self
            .store
            .find_sheet(sheet_id)?
            .ok_or_else(|| DomainError::NotFound(format!("Sheet {} not found", sheet_id)))?;

        if !caller.can_view(&sheet) {
            return Err(DomainError::Forbidden(format!(
                "Not allowed to view sheet {}",
                sheet_id
            )));
        }

        let entries = self.store.sheet_entries(sheet_id)?;

        // Trust the entries over the stored totals
        let weights: Vec<f64> = entries.iter().map(|e| e.weight).collect();
        let derived = SheetTotals::from_weights(&weights);
        if derived.total_weight != sheet.total_weight || derived.average_weight != sheet.average_weight {
            warn!(
                "Sheet {} stored totals {:?}/{:?} differ from entries {:?}/{:?}",
                sheet_id,
                sheet.total_weight,
                sheet.average_weight,
                derived.total_weight,
                derived.average_weight
            );
            sheet.total_weight = derived.total_weight;
            sheet.average_weight = derived.average_weight;
        }

        let seller = self.directory.find(sheet.seller_id)?;
        let buyer = self.directory.find(sheet.buyer_id)?;

        Ok(SheetDetail {
            sheet,
            seller,
            buyer,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CattleType, RawWeight, Role, Sex};
    use crate::store::{seed_admin, SqliteStore};
    use std::sync::Barrier;

    struct Fixture {
        store: Arc<SqliteStore>,
        manager: SheetManager,
        admin: Caller,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let admin_id = seed_admin(store.as_ref());
        Fixture {
            manager: SheetManager::new(store.clone()),
            store,
            admin: Caller {
                subject_id: admin_id,
                role: Role::Admin,
                person_id: None,
            },
        }
    }

    fn client(person_id: PersonId) -> Caller {
        Caller {
            subject_id: 99,
            role: Role::Client,
            person_id: Some(person_id),
        }
    }

    fn input(weight: impl Into<RawWeight>) -> EntryInput {
        EntryInput {
            tag_number: "0012-A".to_string(),
            cattle_type: CattleType::Bull,
            sex: Sex::Male,
            weight: weight.into(),
            mark: None,
        }
    }

    fn by_name(name: &str) -> CounterpartyRef {
        CounterpartyRef::ByName(name.to_string())
    }

    #[test]
    fn test_create_by_name_auto_creates_persons() {
        let f = fixture();

        let detail = f
            .manager
            .create_sheet(&by_name("Ana Gómez"), &by_name("Luis Pérez"), &f.admin)
            .unwrap();

        assert_eq!(detail.seller.name, "Ana Gómez");
        assert_eq!(detail.buyer.name, "Luis Pérez");
        assert_eq!(detail.sheet.total_weight, None);
        assert_eq!(detail.sheet.average_weight, None);
        assert!(detail.entries.is_empty());
        assert_eq!(detail.sheet.created_by, f.admin.subject_id);

        // A second sheet with the same names reuses both persons
        let again = f
            .manager
            .create_sheet(&by_name(" ana gómez"), &by_name("LUIS PÉREZ "), &f.admin)
            .unwrap();
        assert_eq!(again.seller.id, detail.seller.id);
        assert_eq!(again.buyer.id, detail.buyer.id);
    }

    #[test]
    fn test_create_by_legal_id_does_not_auto_create() {
        let f = fixture();
        let directory = PersonDirectory::new(f.store.clone());
        directory.resolve_by_legal_id("100", "Ana", None).unwrap();

        let err = f
            .manager
            .create_sheet(
                &CounterpartyRef::ByLegalId("100".to_string()),
                &CounterpartyRef::ByLegalId("200".to_string()),
                &f.admin,
            )
            .unwrap_err();

        assert!(matches!(err, DomainError::NotFound(_)));
        assert_eq!(f.store.all_persons().unwrap().len(), 1);
    }

    #[test]
    fn test_create_by_id() {
        let f = fixture();
        let directory = PersonDirectory::new(f.store.clone());
        let ana = directory.resolve_by_name("Ana").unwrap();
        let luis = directory.resolve_by_legal_id("9", "Luis", None).unwrap();

        let detail = f
            .manager
            .create_sheet(
                &CounterpartyRef::ById(ana.id),
                &CounterpartyRef::ByLegalId("9".to_string()),
                &f.admin,
            )
            .unwrap();
        assert_eq!(detail.sheet.seller_id, ana.id);
        assert_eq!(detail.sheet.buyer_id, luis.id);

        assert!(matches!(
            f.manager
                .create_sheet(&CounterpartyRef::ById(404), &by_name("Luis"), &f.admin),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn test_failed_create_leaves_no_persons() {
        let f = fixture();

        let err = f
            .manager
            .create_sheet(&by_name("Orphan Seller"), &by_name("   "), &f.admin)
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = f
            .manager
            .create_sheet(
                &by_name("Orphan Seller"),
                &CounterpartyRef::ByLegalId("404".to_string()),
                &f.admin,
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        assert!(f.store.all_persons().unwrap().is_empty());
    }

    #[test]
    fn test_add_entry_rejects_overflowing_total() {
        let f = fixture();
        let detail = f
            .manager
            .create_sheet(&by_name("Ana"), &by_name("Luis"), &f.admin)
            .unwrap();

        f.manager
            .add_entry(detail.sheet.id, input(1.7e308), &f.admin)
            .unwrap();
        let err = f
            .manager
            .add_entry(detail.sheet.id, input(1.7e308), &f.admin)
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)), "{:?}", err);

        let fetched = f.manager.get_sheet(detail.sheet.id, &f.admin).unwrap();
        assert_eq!(fetched.entries.len(), 1);
        assert_eq!(fetched.sheet.total_weight, Some(1.7e308));
        assert!(fetched.sheet.average_weight.is_some());
    }

    #[test]
    fn test_client_cannot_create_or_append() {
        let f = fixture();
        let err = f
            .manager
            .create_sheet(&by_name("Ana"), &by_name("Luis"), &client(1))
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
        // Nothing resolved on a refused request
        assert!(f.store.all_persons().unwrap().is_empty());

        let detail = f
            .manager
            .create_sheet(&by_name("Ana"), &by_name("Luis"), &f.admin)
            .unwrap();
        let err = f
            .manager
            .add_entry(detail.sheet.id, input(450.0), &client(detail.seller.id))
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn test_add_entry_validates_weight() {
        let f = fixture();
        let detail = f
            .manager
            .create_sheet(&by_name("Ana"), &by_name("Luis"), &f.admin)
            .unwrap();

        for bad in [RawWeight::from(0.0), RawWeight::from(-3.0), RawWeight::from("abc")] {
            let err = f
                .manager
                .add_entry(detail.sheet.id, input(bad), &f.admin)
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "{:?}", err);
        }

        let appended = f
            .manager
            .add_entry(detail.sheet.id, input(450.0), &f.admin)
            .unwrap();
        assert_eq!(appended.entry.tag_number, "0012-A");
        assert_eq!(appended.updated_sheet.total_weight, Some(450.0));
        assert_eq!(appended.updated_sheet.average_weight, Some(450));

        let fetched = f.manager.get_sheet(detail.sheet.id, &f.admin).unwrap();
        assert_eq!(fetched.entries.len(), 1);
        assert_eq!(fetched.entries[0].tag_number, "0012-A");
        assert_eq!(fetched.entries[0].weight, 450.0);
    }

    #[test]
    fn test_add_entry_unknown_sheet() {
        let f = fixture();
        assert!(matches!(
            f.manager.add_entry(777, input(450.0), &f.admin),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn test_tag_number_kept_verbatim_and_blank_mark_dropped() {
        let f = fixture();
        let detail = f
            .manager
            .create_sheet(&by_name("Ana"), &by_name("Luis"), &f.admin)
            .unwrap();

        let mut raw = input("380");
        raw.tag_number = " 07 / b ".to_string();
        raw.mark = Some("  ".to_string());

        let appended = f.manager.add_entry(detail.sheet.id, raw, &f.admin).unwrap();
        assert_eq!(appended.entry.tag_number, " 07 / b ");
        assert_eq!(appended.entry.mark, None);
        assert_eq!(appended.entry.weight, 380.0);
    }

    #[test]
    fn test_totals_track_every_append() {
        let f = fixture();
        let detail = f
            .manager
            .create_sheet(&by_name("Ana"), &by_name("Luis"), &f.admin)
            .unwrap();

        let weights = [450.0, 312.5, 401.0, 299.0];
        let mut expected_total = 0.0;
        for (i, w) in weights.iter().enumerate() {
            let appended = f.manager.add_entry(detail.sheet.id, input(*w), &f.admin).unwrap();
            expected_total += w;
            let count = (i + 1) as f64;
            assert_eq!(appended.updated_sheet.total_weight, Some(expected_total));
            assert_eq!(
                appended.updated_sheet.average_weight,
                Some((expected_total / count).floor() as i64)
            );
        }
    }

    #[test]
    fn test_get_sheet_access() {
        let f = fixture();
        let detail = f
            .manager
            .create_sheet(&by_name("Ana"), &by_name("Luis"), &f.admin)
            .unwrap();
        let id = detail.sheet.id;

        assert!(f.manager.get_sheet(id, &client(detail.seller.id)).is_ok());
        assert!(f.manager.get_sheet(id, &client(detail.buyer.id)).is_ok());
        assert!(matches!(
            f.manager.get_sheet(id, &client(12345)),
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            f.manager.get_sheet(id + 1, &client(detail.seller.id)),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn test_get_sheet_rederives_stale_totals() {
        let f = fixture();
        let detail = f
            .manager
            .create_sheet(&by_name("Ana"), &by_name("Luis"), &f.admin)
            .unwrap();
        f.manager.add_entry(detail.sheet.id, input(100.0), &f.admin).unwrap();
        f.store
            .force_totals(
                detail.sheet.id,
                SheetTotals {
                    total_weight: Some(1.0),
                    average_weight: Some(1),
                },
            )
            .unwrap();

        let fetched = f.manager.get_sheet(detail.sheet.id, &f.admin).unwrap();
        assert_eq!(fetched.sheet.total_weight, Some(100.0));
        assert_eq!(fetched.sheet.average_weight, Some(100));
    }

    #[test]
    fn test_concurrent_appends_keep_totals_consistent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheets.db");

        let (sheet_id, admin) = {
            let store = Arc::new(SqliteStore::open(&path).unwrap());
            let admin_id = seed_admin(store.as_ref());
            let admin = Caller {
                subject_id: admin_id,
                role: Role::Admin,
                person_id: None,
            };
            let detail = SheetManager::new(store)
                .create_sheet(&by_name("Ana"), &by_name("Luis"), &admin)
                .unwrap();
            (detail.sheet.id, admin)
        };

        let threads = 6;
        let per_thread = 5;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let path = path.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let manager = SheetManager::new(Arc::new(SqliteStore::open(&path).unwrap()));
                    barrier.wait();
                    for i in 0..per_thread {
                        let weight = (100 + t * 10 + i) as f64;
                        manager.add_entry(sheet_id, input(weight), &admin).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let store = Arc::new(SqliteStore::open(&path).unwrap());
        let sheet = store.find_sheet(sheet_id).unwrap().unwrap();
        let entries = store.sheet_entries(sheet_id).unwrap();
        let sum: f64 = entries.iter().map(|e| e.weight).sum();

        assert_eq!(entries.len(), threads * per_thread);
        assert_eq!(sheet.total_weight, Some(sum));
        assert_eq!(
            sheet.average_weight,
            Some((sum / entries.len() as f64).floor() as i64)
        );
    }
}
