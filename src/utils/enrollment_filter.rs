use std::sync::{PoisonError, RwLock};

use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;

/// Expected capacity and false-positive rate.
const FILTER_CAPACITY: usize = 50_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

static ENROLLMENT_FILTER: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

#[inline]
fn normalize(enrollment_number: &str) -> String {
    enrollment_number.trim().to_uppercase()
}

/// `false` means the enrollment number is definitely unused.
pub fn might_exist(enrollment_number: &str) -> bool {
    let key = normalize(enrollment_number);
    ENROLLMENT_FILTER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains(&key)
}

pub fn insert(enrollment_number: &str) {
    let key = normalize(enrollment_number);
    ENROLLMENT_FILTER
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .add(&key);
}

/// Called when a student's enrollment number changes.
pub fn remove(enrollment_number: &str) {
    let key = normalize(enrollment_number);
    ENROLLMENT_FILTER
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&key);
}

fn insert_batch(enrollment_numbers: &[String]) {
    let mut filter = ENROLLMENT_FILTER
        .write()
        .unwrap_or_else(PoisonError::into_inner);

    for key in enrollment_numbers {
        filter.add(key);
    }
}

/// Loads every enrollment number, inactive students included, since the
/// unique index covers them too.
pub async fn warmup_enrollment_filter(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream =
        sqlx::query_as::<_, (String,)>("SELECT enrollment_number FROM students").fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (enrollment_number,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;

        batch.push(normalize(&enrollment_number));
        total += 1;

        if batch.len() == batch_size {
            insert_batch(&batch);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        insert_batch(&batch);
    }

    tracing::info!(total, "Enrollment filter warmup complete");
    Ok(())
}
