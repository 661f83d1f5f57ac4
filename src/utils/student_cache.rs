use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;

/// Ids of students known to be inactive.
///
/// Deactivation is one-way and ids are never reused, so an entry can never go
/// stale. A miss proves nothing; the attendance write path still checks the
/// `students` table inside its transaction.
pub static INACTIVE_STUDENTS: Lazy<Cache<u64, ()>> =
    Lazy::new(|| Cache::builder().max_capacity(100_000).build());

pub async fn mark_inactive(student_id: u64) {
    INACTIVE_STUDENTS.insert(student_id, ()).await;
}

pub async fn is_known_inactive(student_id: u64) -> bool {
    INACTIVE_STUDENTS.contains_key(&student_id)
}

async fn batch_mark(ids: &[u64]) {
    let futures: Vec<_> = ids
        .iter()
        .map(|id| INACTIVE_STUDENTS.insert(*id, ()))
        .collect();

    futures::future::join_all(futures).await;
}

/// Preloads inactive students so attendance for them is refused without a
/// transaction.
pub async fn warmup_inactive_students(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream =
        sqlx::query_as::<_, (u64,)>("SELECT id FROM students WHERE status = 'inactive'")
            .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (id,) = row?;
        batch.push(id);
        total += 1;

        if batch.len() >= batch_size {
            batch_mark(&batch).await;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        batch_mark(&batch).await;
    }

    tracing::info!(total, "Inactive student cache warmup complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn marked_students_are_known_inactive() {
        assert!(!is_known_inactive(900_001).await);

        mark_inactive(900_001).await;
        assert!(is_known_inactive(900_001).await);
    }

    #[actix_web::test]
    async fn batch_marking_covers_every_id() {
        batch_mark(&[900_101, 900_102, 900_103]).await;

        for id in [900_101, 900_102, 900_103] {
            assert!(is_known_inactive(id).await, "{id}");
        }
    }
}
