use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::warn;
use uuid::Uuid;

use crate::{
	Result,
	filter::{CompanyFilter, SortDirection, SortField, SortSpec},
	models::Company,
};

const SELECT_COMPANIES: &str = "SELECT company_id, name, domain, industry, locality, region, \
	country, size, founded_year, linkedin_url, enrichment, last_enriched_at, created_at, \
	updated_at FROM companies";

#[derive(Debug, Clone)]
pub struct PageRequest {
	pub limit: u32,
	pub cursor: Option<String>,
	pub include_total: bool,
}

#[derive(Debug)]
pub struct CompanyPage {
	pub rows: Vec<Company>,
	pub next_cursor: Option<String>,
	pub prev_cursor: Option<String>,
	pub has_more: bool,
	pub total: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
enum CursorDirection {
	Forward,
	Backward,
}

/// Opaque resume token: the (sort value, id) pair of a boundary row plus a
/// fingerprint of the (filter, sort) pair that produced it. A cursor is only
/// valid against that exact pair; anything else decodes as absent.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct CursorToken {
	f: String,
	d: CursorDirection,
	s: Value,
	id: Uuid,
}

#[derive(Debug, Clone)]
enum SortValue {
	Text(String),
	Timestamp(OffsetDateTime),
}

/// Keyset-paginate a filtered, sorted company scan.
///
/// Fetches `limit + 1` rows past the cursor boundary using a compound
/// `(sort value, company_id)` inequality, so rows sharing a sort value are
/// neither skipped nor duplicated across pages. Backward paging inverts both
/// the comparison and the scan order, then un-reverses the rows, so callers
/// always see the canonical sort order. The total count is only computed on
/// request.
pub async fn page(
	pool: &PgPool,
	filter: &CompanyFilter,
	sort: &SortSpec,
	req: &PageRequest,
) -> Result<CompanyPage> {
	let fingerprint = fingerprint(filter, sort);
	let cursor = req.cursor.as_deref().and_then(|raw| decode_cursor(raw, &fingerprint, sort));
	let backward = cursor
		.as_ref()
		.map(|(token_direction, ..)| *token_direction == CursorDirection::Backward)
		.unwrap_or(false);
	let scan_primary_asc = (sort.direction == SortDirection::Asc) != backward;
	let limit = req.limit.max(1) as i64;

	let mut builder = QueryBuilder::<Postgres>::new(SELECT_COMPANIES);
	let mut has_where = false;

	if !filter.is_empty() {
		builder.push(" WHERE ");
		filter.push_conditions(&mut builder);

		has_where = true;
	}

	if let Some((_, sort_value, boundary_id)) = cursor.as_ref() {
		builder.push(if has_where { " AND " } else { " WHERE " });

		let column = sort.field.column();
		let primary_op = if scan_primary_asc { " > " } else { " < " };
		let id_op = if backward { " < " } else { " > " };

		builder.push("(");
		builder.push(column);
		builder.push(primary_op);
		push_sort_value(&mut builder, sort_value);
		builder.push(" OR (");
		builder.push(column);
		builder.push(" = ");
		push_sort_value(&mut builder, sort_value);
		builder.push(" AND company_id");
		builder.push(id_op);
		builder.push_bind(*boundary_id);
		builder.push("))");
	}

	builder.push(" ORDER BY ");
	builder.push(sort.field.column());
	builder.push(if scan_primary_asc { " ASC" } else { " DESC" });
	builder.push(", company_id");
	builder.push(if backward { " DESC" } else { " ASC" });
	builder.push(" LIMIT ");
	builder.push_bind(limit + 1);

	let mut rows: Vec<Company> = builder.build_query_as().fetch_all(pool).await?;
	let has_more = rows.len() as i64 > limit;

	if has_more {
		rows.truncate(limit as usize);
	}
	if backward {
		rows.reverse();
	}

	let next_cursor = match (rows.last(), backward) {
		// Forward scans only have a next page when the extra row came back.
		(Some(last), false) if has_more => {
			Some(encode_cursor(&fingerprint, CursorDirection::Forward, sort, last))
		},
		// A backward scan was started from somewhere, so a next page exists.
		(Some(last), true) => {
			Some(encode_cursor(&fingerprint, CursorDirection::Forward, sort, last))
		},
		_ => None,
	};
	let prev_cursor = match (rows.first(), backward) {
		(Some(first), true) if has_more => {
			Some(encode_cursor(&fingerprint, CursorDirection::Backward, sort, first))
		},
		(Some(first), false) if cursor.is_some() => {
			Some(encode_cursor(&fingerprint, CursorDirection::Backward, sort, first))
		},
		_ => None,
	};

	let total = if req.include_total { Some(count(pool, filter).await?) } else { None };

	Ok(CompanyPage { rows, next_cursor, prev_cursor, has_more, total })
}

// Full count is a separate scan; only run when the caller asked for it.
async fn count(pool: &PgPool, filter: &CompanyFilter) -> Result<i64> {
	let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM companies");

	if !filter.is_empty() {
		builder.push(" WHERE ");
		filter.push_conditions(&mut builder);
	}

	let total: i64 = builder.build_query_scalar().fetch_one(pool).await?;

	Ok(total)
}

fn fingerprint(filter: &CompanyFilter, sort: &SortSpec) -> String {
	let payload = serde_json::json!({
		"filter": filter.fingerprint_value(),
		"sort": sort.fingerprint_value(),
	});
	let raw = serde_json::to_vec(&payload).unwrap_or_default();

	blake3::hash(&raw).to_hex().to_string()
}

fn encode_cursor(
	fingerprint: &str,
	direction: CursorDirection,
	sort: &SortSpec,
	row: &Company,
) -> String {
	let sort_value = match sort.field {
		SortField::Name => Value::String(row.name.clone()),
		SortField::CreatedAt => timestamp_value(row.created_at),
		SortField::UpdatedAt => timestamp_value(row.updated_at),
	};
	let token = CursorToken {
		f: fingerprint.to_string(),
		d: direction,
		s: sort_value,
		id: row.company_id,
	};
	let raw = serde_json::to_vec(&token).unwrap_or_default();

	URL_SAFE_NO_PAD.encode(raw)
}

fn decode_cursor(
	raw: &str,
	fingerprint: &str,
	sort: &SortSpec,
) -> Option<(CursorDirection, SortValue, Uuid)> {
	let bytes = match URL_SAFE_NO_PAD.decode(raw) {
		Ok(bytes) => bytes,
		Err(err) => {
			warn!(error = %err, "Cursor is not valid base64; restarting from the first page.");

			return None;
		},
	};
	let token: CursorToken = match serde_json::from_slice(&bytes) {
		Ok(token) => token,
		Err(err) => {
			warn!(error = %err, "Cursor payload failed to decode; restarting from the first page.");

			return None;
		},
	};

	if token.f != fingerprint {
		warn!("Cursor belongs to a different filter/sort pair; restarting from the first page.");

		return None;
	}

	let sort_value = match sort.field {
		SortField::Name => token.s.as_str().map(|text| SortValue::Text(text.to_string())),
		SortField::CreatedAt | SortField::UpdatedAt => token
			.s
			.as_str()
			.and_then(|text| OffsetDateTime::parse(text, &Rfc3339).ok())
			.map(SortValue::Timestamp),
	};
	let Some(sort_value) = sort_value else {
		warn!("Cursor sort value does not match the sort field; restarting from the first page.");

		return None;
	};

	Some((token.d, sort_value, token.id))
}

fn push_sort_value(builder: &mut QueryBuilder<'_, Postgres>, value: &SortValue) {
	match value {
		SortValue::Text(text) => {
			builder.push_bind(text.clone());
		},
		SortValue::Timestamp(ts) => {
			builder.push_bind(*ts);
		},
	}
}

fn timestamp_value(ts: OffsetDateTime) -> Value {
	Value::String(ts.format(&Rfc3339).unwrap_or_default())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn company(name: &str) -> Company {
		let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("timestamp");

		Company {
			company_id: Uuid::new_v4(),
			name: name.to_string(),
			domain: None,
			industry: None,
			locality: None,
			region: None,
			country: None,
			size: None,
			founded_year: None,
			linkedin_url: None,
			enrichment: None,
			last_enriched_at: None,
			created_at: now,
			updated_at: now,
		}
	}

	#[test]
	fn cursor_round_trips() {
		let sort = SortSpec::default();
		let row = company("PayFlow");
		let token = encode_cursor("fp", CursorDirection::Forward, &sort, &row);
		let (direction, sort_value, id) =
			decode_cursor(&token, "fp", &sort).expect("cursor must decode");

		assert_eq!(direction, CursorDirection::Forward);
		assert!(matches!(sort_value, SortValue::Text(ref name) if name == "PayFlow"));
		assert_eq!(id, row.company_id);
	}

	#[test]
	fn foreign_fingerprint_is_treated_as_absent() {
		let sort = SortSpec::default();
		let token = encode_cursor("fp-a", CursorDirection::Forward, &sort, &company("A"));

		assert!(decode_cursor(&token, "fp-b", &sort).is_none());
	}

	#[test]
	fn malformed_cursor_is_treated_as_absent() {
		let sort = SortSpec::default();

		assert!(decode_cursor("not-base64!!!", "fp", &sort).is_none());
		assert!(decode_cursor(&URL_SAFE_NO_PAD.encode(b"{}"), "fp", &sort).is_none());
	}

	#[test]
	fn timestamp_cursor_round_trips() {
		let sort = SortSpec { field: SortField::CreatedAt, direction: SortDirection::Desc };
		let row = company("PayFlow");
		let token = encode_cursor("fp", CursorDirection::Backward, &sort, &row);
		let (direction, sort_value, _) =
			decode_cursor(&token, "fp", &sort).expect("cursor must decode");

		assert_eq!(direction, CursorDirection::Backward);
		assert!(matches!(sort_value, SortValue::Timestamp(ts) if ts == row.created_at));
	}

	#[test]
	fn cursor_is_not_portable_across_sort_orders() {
		let name_sort = SortSpec::default();
		let time_sort = SortSpec { field: SortField::CreatedAt, direction: SortDirection::Asc };
		let row = company("PayFlow");
		let token = encode_cursor("fp", CursorDirection::Forward, &name_sort, &row);

		// Same fingerprint string, different sort field: the sort value no
		// longer parses as a timestamp and the cursor is dropped.
		assert!(decode_cursor(&token, "fp", &time_sort).is_none());
	}
}
