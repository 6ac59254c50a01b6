use redb::{ReadableTable, WriteTransaction};

use super::db::{next_id, Database, DatabaseError};
use super::models::{Customer, CustomerId};
use super::tables::*;

impl Database {
    // ========================================================================
    // Customer operations
    // ========================================================================

    /// Get a customer by id
    pub fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(CUSTOMERS)?;

        match table.get(id)? {
            Some(data) => {
                let customer: Customer = rmp_serde::from_slice(data.value())?;
                Ok(Some(customer))
            }
            None => Ok(None),
        }
    }

    /// All customers in id order
    pub fn list_customers(&self) -> Result<Vec<Customer>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(CUSTOMERS)?;

        let mut customers = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let customer: Customer = rmp_serde::from_slice(value.value())?;
            customers.push(customer);
        }

        Ok(customers)
    }

    /// Find a customer by name, creating it if absent.
    ///
    /// `make_token` is called for a new customer, or for an existing one that has
    /// no token yet. Returns the customer and whether it was created.
    pub fn ensure_customer(
        &self,
        name: &str,
        make_token: impl FnOnce() -> String,
    ) -> Result<(Customer, bool), DatabaseError> {
        debug_assert!(!name.is_empty(), "customer name must not be empty");

        let write_txn = self.begin_write()?;

        let existing_id = {
            let names = write_txn.open_table(CUSTOMER_NAMES)?;
            let result = names.get(name)?.map(|v| v.value());
            result
        };

        let (customer, created) = match existing_id {
            Some(id) => {
                let mut customer = load_customer(&write_txn, id)?.ok_or_else(|| {
                    DatabaseError::Conflict(format!("name index points at missing customer {id}"))
                })?;
                if customer.token.as_deref().map_or(true, str::is_empty) {
                    let token = make_token();
                    claim_token(&write_txn, &token, id)?;
                    customer.token = Some(token);
                    save_customer(&write_txn, &customer)?;
                }
                (customer, false)
            }
            None => {
                let id = next_id(&write_txn, "customers")?;
                let token = make_token();
                claim_token(&write_txn, &token, id)?;

                let customer = Customer {
                    id,
                    name: name.to_string(),
                    token: Some(token),
                };
                save_customer(&write_txn, &customer)?;

                let mut names = write_txn.open_table(CUSTOMER_NAMES)?;
                names.insert(name, id)?;
                (customer, true)
            }
        };

        write_txn.commit()?;
        Ok((customer, created))
    }

    /// Replace a customer's token. Returns `None` if the customer does not exist.
    pub fn rotate_customer_token(
        &self,
        id: CustomerId,
        new_token: &str,
    ) -> Result<Option<Customer>, DatabaseError> {
        let write_txn = self.begin_write()?;

        let Some(mut customer) = load_customer(&write_txn, id)? else {
            write_txn.abort()?;
            return Ok(None);
        };

        if let Some(old) = customer.token.as_deref() {
            let mut tokens = write_txn.open_table(CUSTOMER_TOKENS)?;
            tokens.remove(old)?;
        }
        claim_token(&write_txn, new_token, id)?;
        customer.token = Some(new_token.to_string());
        save_customer(&write_txn, &customer)?;

        write_txn.commit()?;
        Ok(Some(customer))
    }
}

fn load_customer(
    txn: &WriteTransaction,
    id: CustomerId,
) -> Result<Option<Customer>, DatabaseError> {
    let table = txn.open_table(CUSTOMERS)?;
    let result = match table.get(id)? {
        Some(data) => Some(rmp_serde::from_slice(data.value())?),
        None => None,
    };
    Ok(result)
}

fn save_customer(txn: &WriteTransaction, customer: &Customer) -> Result<(), DatabaseError> {
    let mut table = txn.open_table(CUSTOMERS)?;
    let data = rmp_serde::to_vec_named(customer)?;
    table.insert(customer.id, data.as_slice())?;
    Ok(())
}

/// Point `token` at `id`, failing if another customer already holds it.
fn claim_token(txn: &WriteTransaction, token: &str, id: CustomerId) -> Result<(), DatabaseError> {
    let mut tokens = txn.open_table(CUSTOMER_TOKENS)?;
    let holder = tokens.get(token)?.map(|v| v.value());
    if let Some(other) = holder.filter(|other| *other != id) {
        return Err(DatabaseError::Conflict(format!(
            "token already assigned to customer {other}"
        )));
    }
    tokens.insert(token, id)?;
    Ok(())
}
