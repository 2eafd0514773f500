//! Application use cases (business logic orchestration).

mod finance;

pub use finance::FinanceService;
