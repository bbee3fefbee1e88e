use std::sync::Arc;

use chrono::NaiveDate;
use entity::employees::{ActiveModel, Model, Status};
use sea_orm::ActiveValue::{NotSet, Set};
use tracing::info;

use crate::error::{EmployeeError, EmployeeResult};
use crate::store::EmployeeStore;

/// Input for the create operation. Every field is optional so missing or
/// null JSON fields reach the validation rules instead of being rejected
/// at deserialization.
#[derive(Clone, Debug, Default)]
pub struct NewEmployee {
    pub name: Option<String>,
    pub join_date: Option<NaiveDate>,
    pub status: Option<Status>,
    pub position: Option<String>,
}

/// Partial update. `name` and `id` are deliberately absent; the update
/// operation never modifies them.
#[derive(Clone, Debug, Default)]
pub struct EmployeePatch {
    pub position: Option<String>,
    pub status: Option<Status>,
    pub join_date: Option<NaiveDate>,
}

/// Validation and orchestration atop the store. The store is injected
/// through the constructor; the service holds no other state.
#[derive(Clone)]
pub struct EmployeeService {
    store: Arc<dyn EmployeeStore>,
}

impl EmployeeService {
    pub fn new(store: Arc<dyn EmployeeStore>) -> Self {
        Self { store }
    }

    pub async fn create_employee(&self, input: NewEmployee) -> EmployeeResult<Model> {
        let name = match input.name.as_deref().map(str::trim) {
            Some(trimmed) if !trimmed.is_empty() => trimmed.to_string(),
            _ => {
                return Err(EmployeeError::Validation(
                    "Employee name cannot be null or empty.".into(),
                ));
            }
        };
        let Some(join_date) = input.join_date else {
            return Err(EmployeeError::Validation(
                "Employee join date cannot be null.".into(),
            ));
        };
        let Some(status) = input.status else {
            return Err(EmployeeError::Validation(
                "Employee status cannot be null.".into(),
            ));
        };

        // Fast path only; the UNIQUE constraint on name is the final
        // arbiter under concurrent creates.
        if self.store.exists_by_name(&name).await? {
            return Err(EmployeeError::Validation(format!(
                "An employee with the name '{name}' already exists."
            )));
        }

        let record = ActiveModel {
            id: NotSet,
            name: Set(name),
            join_date: Set(join_date),
            status: Set(status),
            position: Set(input.position),
        };
        let created = self.store.save(record).await?;
        info!(id = created.id, "employee created");
        Ok(created)
    }

    pub async fn get_all_employees(&self) -> EmployeeResult<Vec<Model>> {
        Ok(self.store.find_all().await?)
    }

    pub async fn update_employee(&self, id: i64, patch: EmployeePatch) -> EmployeeResult<Model> {
        let mut existing = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(EmployeeError::NotFound(id))?;

        if let Some(position) = patch.position.as_deref().map(str::trim) {
            if !position.is_empty() {
                existing.position = Some(position.to_string());
            }
        }
        if let Some(status) = patch.status {
            existing.status = status;
        }
        if let Some(join_date) = patch.join_date {
            existing.join_date = join_date;
        }

        let record = ActiveModel {
            id: Set(existing.id),
            name: Set(existing.name),
            join_date: Set(existing.join_date),
            status: Set(existing.status),
            position: Set(existing.position),
        };
        let updated = self.store.save(record).await?;
        info!(id, "employee updated");
        Ok(updated)
    }

    pub async fn delete_employee(&self, id: i64) -> EmployeeResult<()> {
        if !self.store.exists_by_id(id).await? {
            return Err(EmployeeError::NotFound(id));
        }
        self.store.delete_by_id(id).await?;
        info!(id, "employee deleted");
        Ok(())
    }
}
