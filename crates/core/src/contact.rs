use serde::Serialize;

use crate::types::{CustomerId, CustomerRecord};

/// Contact body posted to the Mautic contact endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactUpsertPayload {
    pub eccubecustomerid: CustomerId,
    pub lastname: Option<String>,
    pub firstname: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
}

impl From<&CustomerRecord> for ContactUpsertPayload {
    fn from(record: &CustomerRecord) -> Self {
        Self {
            eccubecustomerid: record.id,
            lastname: record.name01.clone(),
            firstname: record.name02.clone(),
            email: record.email.clone(),
            company: record.company_name.clone(),
            phone: record.phone_number.clone(),
        }
    }
}

impl From<CustomerRecord> for ContactUpsertPayload {
    fn from(record: CustomerRecord) -> Self {
        Self {
            eccubecustomerid: record.id,
            lastname: record.name01,
            firstname: record.name02,
            email: record.email,
            company: record.company_name,
            phone: record.phone_number,
        }
    }
}
