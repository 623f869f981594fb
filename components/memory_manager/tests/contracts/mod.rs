//! Contract tests for memory_manager

mod test_contract_compliance;
