pub mod employees;
pub mod error;
pub mod store;

pub use employees::{EmployeePatch, EmployeeService, NewEmployee};
pub use error::{EmployeeError, EmployeeResult};
pub use store::{EmployeeStore, SeaOrmStore};
