use pidloga_db::{DemoCatalog, SqlCatalogRepository};

use crate::commands::{open_database, prepare, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;

        let seeded = DemoCatalog::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 6u8));
        let total = match &seeded {
            Ok(_) => SqlCatalogRepository::new(pool.clone())
                .count()
                .await
                .map_err(|error| ("seed_verification", error.to_string(), 6u8)),
            Err(_) => Ok(0),
        };

        pool.close().await;
        let seeded = seeded?;
        Ok::<_, StepFailure>((seeded.products_seeded.len(), seeded.products_created, total?))
    });

    match result {
        Ok((seeded, created, total)) => {
            CommandResult::success("seed", seed_message(seeded, created, total))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn seed_message(seeded: usize, created: u64, total: u64) -> String {
    format!("demo catalog loaded: {seeded} products seeded ({created} new), {total} in catalog")
}

#[cfg(test)]
mod tests {
    use super::seed_message;

    #[test]
    fn message_reports_new_and_total_counts() {
        assert_eq!(
            seed_message(5, 0, 5),
            "demo catalog loaded: 5 products seeded (0 new), 5 in catalog"
        );
    }
}
