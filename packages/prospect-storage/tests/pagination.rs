use prospect_storage::{
	db::Db,
	filter::{CompanyFilter, SortDirection, SortField, SortSpec},
	models::NewCompany,
	page::{PageRequest, page},
	queries,
};
use prospect_testkit::{TestDatabase, env_dsn};

use prospect_domain::StructuredQuery;

async fn connect(dsn: &str) -> Db {
	let cfg = prospect_config::Postgres { dsn: dsn.to_string(), pool_max_conns: 4 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to test database.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	db
}

// Many rows share a name so the compound (sort value, id) inequality is
// actually exercised.
async fn seed(db: &Db) -> usize {
	let names = ["Alpha", "Beta", "Gamma"];
	let mut count = 0;

	for name in names {
		for ordinal in 0..7 {
			let company = NewCompany {
				name: name.to_string(),
				domain: Some(format!("{}{}.example.com", name.to_lowercase(), ordinal)),
				industry: Some(if ordinal % 2 == 0 { "fintech" } else { "robotics" }.to_string()),
				country: Some("Germany".to_string()),
				..NewCompany::default()
			};

			queries::insert_company(&db.pool, company).await.expect("Failed to seed company.");

			count += 1;
		}
	}

	count
}

fn name_asc() -> SortSpec {
	SortSpec { field: SortField::Name, direction: SortDirection::Asc }
}

#[tokio::test]
async fn forward_pages_reconstruct_the_full_scan() {
	let Some(dsn) = env_dsn() else {
		eprintln!("Skipping; set PROSPECT_PG_DSN to run storage tests.");

		return;
	};
	let tdb = TestDatabase::new(&dsn).await.expect("Failed to create test database.");
	let db = connect(tdb.dsn()).await;
	let seeded = seed(&db).await;
	let filter = CompanyFilter::default();
	let sort = name_asc();

	let full = page(
		&db.pool,
		&filter,
		&sort,
		&PageRequest { limit: 100, cursor: None, include_total: true },
	)
	.await
	.expect("Full scan failed.");

	assert_eq!(full.rows.len(), seeded);
	assert_eq!(full.total, Some(seeded as i64));
	assert!(!full.has_more);

	let mut collected = Vec::new();
	let mut cursor: Option<String> = None;

	loop {
		let chunk = page(
			&db.pool,
			&filter,
			&sort,
			&PageRequest { limit: 4, cursor: cursor.clone(), include_total: false },
		)
		.await
		.expect("Paged scan failed.");

		assert!(chunk.total.is_none(), "Total must only be computed on request.");

		collected.extend(chunk.rows.iter().map(|row| row.company_id));

		match (chunk.has_more, chunk.next_cursor) {
			(true, Some(next)) => cursor = Some(next),
			_ => break,
		}
	}

	let full_ids: Vec<_> = full.rows.iter().map(|row| row.company_id).collect();

	assert_eq!(collected, full_ids, "Paged scan must match the unpaginated order exactly.");

	tdb.cleanup().await.expect("Cleanup failed.");
}

#[tokio::test]
async fn reverse_then_forward_returns_to_the_same_page() {
	let Some(dsn) = env_dsn() else {
		eprintln!("Skipping; set PROSPECT_PG_DSN to run storage tests.");

		return;
	};
	let tdb = TestDatabase::new(&dsn).await.expect("Failed to create test database.");
	let db = connect(tdb.dsn()).await;

	seed(&db).await;

	let filter = CompanyFilter::default();
	let sort = name_asc();
	let first = page(
		&db.pool,
		&filter,
		&sort,
		&PageRequest { limit: 5, cursor: None, include_total: false },
	)
	.await
	.expect("First page failed.");
	let second = page(
		&db.pool,
		&filter,
		&sort,
		&PageRequest { limit: 5, cursor: first.next_cursor.clone(), include_total: false },
	)
	.await
	.expect("Second page failed.");

	let back = page(
		&db.pool,
		&filter,
		&sort,
		&PageRequest { limit: 5, cursor: second.prev_cursor.clone(), include_total: false },
	)
	.await
	.expect("Backward page failed.");

	let first_ids: Vec<_> = first.rows.iter().map(|row| row.company_id).collect();
	let back_ids: Vec<_> = back.rows.iter().map(|row| row.company_id).collect();

	assert_eq!(back_ids, first_ids, "Backward paging must restore the previous page.");

	let forward_again = page(
		&db.pool,
		&filter,
		&sort,
		&PageRequest { limit: 5, cursor: back.next_cursor.clone(), include_total: false },
	)
	.await
	.expect("Forward-again page failed.");

	let second_ids: Vec<_> = second.rows.iter().map(|row| row.company_id).collect();
	let again_ids: Vec<_> = forward_again.rows.iter().map(|row| row.company_id).collect();

	assert_eq!(again_ids, second_ids, "Forward paging must return to the original page.");

	tdb.cleanup().await.expect("Cleanup failed.");
}

#[tokio::test]
async fn filtered_and_descending_scans_page_cleanly() {
	let Some(dsn) = env_dsn() else {
		eprintln!("Skipping; set PROSPECT_PG_DSN to run storage tests.");

		return;
	};
	let tdb = TestDatabase::new(&dsn).await.expect("Failed to create test database.");
	let db = connect(tdb.dsn()).await;

	seed(&db).await;

	let query = StructuredQuery {
		industry: Some("fintech".to_string()),
		..StructuredQuery::default()
	};
	let filter = CompanyFilter::from_query(&query);
	let sort = SortSpec { field: SortField::Name, direction: SortDirection::Desc };
	let full = page(
		&db.pool,
		&filter,
		&sort,
		&PageRequest { limit: 100, cursor: None, include_total: false },
	)
	.await
	.expect("Full filtered scan failed.");

	assert!(!full.rows.is_empty());
	assert!(full.rows.iter().all(|row| row.industry.as_deref() == Some("fintech")));

	let mut collected = Vec::new();
	let mut cursor: Option<String> = None;

	loop {
		let chunk = page(
			&db.pool,
			&filter,
			&sort,
			&PageRequest { limit: 3, cursor: cursor.clone(), include_total: false },
		)
		.await
		.expect("Paged filtered scan failed.");

		collected.extend(chunk.rows.iter().map(|row| row.company_id));

		match (chunk.has_more, chunk.next_cursor) {
			(true, Some(next)) => cursor = Some(next),
			_ => break,
		}
	}

	let full_ids: Vec<_> = full.rows.iter().map(|row| row.company_id).collect();

	assert_eq!(collected, full_ids);

	tdb.cleanup().await.expect("Cleanup failed.");
}

#[tokio::test]
async fn malformed_cursor_restarts_from_the_first_page() {
	let Some(dsn) = env_dsn() else {
		eprintln!("Skipping; set PROSPECT_PG_DSN to run storage tests.");

		return;
	};
	let tdb = TestDatabase::new(&dsn).await.expect("Failed to create test database.");
	let db = connect(tdb.dsn()).await;

	seed(&db).await;

	let filter = CompanyFilter::default();
	let sort = name_asc();
	let clean = page(
		&db.pool,
		&filter,
		&sort,
		&PageRequest { limit: 5, cursor: None, include_total: false },
	)
	.await
	.expect("First page failed.");
	let garbled = page(
		&db.pool,
		&filter,
		&sort,
		&PageRequest {
			limit: 5,
			cursor: Some("definitely-not-a-cursor".to_string()),
			include_total: false,
		},
	)
	.await
	.expect("Garbled cursor must not fail the query.");

	let clean_ids: Vec<_> = clean.rows.iter().map(|row| row.company_id).collect();
	let garbled_ids: Vec<_> = garbled.rows.iter().map(|row| row.company_id).collect();

	assert_eq!(garbled_ids, clean_ids);

	tdb.cleanup().await.expect("Cleanup failed.");
}
