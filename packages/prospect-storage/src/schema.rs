pub fn render_schema() -> String {
	"
CREATE TABLE IF NOT EXISTS companies (
	company_id UUID PRIMARY KEY,
	name TEXT NOT NULL,
	domain TEXT,
	industry TEXT,
	locality TEXT,
	region TEXT,
	country TEXT,
	size TEXT,
	founded_year INT,
	linkedin_url TEXT,
	enrichment TEXT,
	last_enriched_at TIMESTAMPTZ,
	created_at TIMESTAMPTZ NOT NULL,
	updated_at TIMESTAMPTZ NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS companies_name_domain_key
	ON companies (lower(name), lower(coalesce(domain, '')));

CREATE INDEX IF NOT EXISTS companies_industry_country_idx
	ON companies (industry, country);

CREATE INDEX IF NOT EXISTS companies_name_idx
	ON companies (name, company_id);

CREATE INDEX IF NOT EXISTS companies_domain_idx
	ON companies (lower(domain));

CREATE TABLE IF NOT EXISTS company_embeddings (
	company_id UUID NOT NULL REFERENCES companies(company_id) ON DELETE CASCADE,
	embedding_version TEXT NOT NULL,
	embedding_dim INT NOT NULL,
	vec REAL[] NOT NULL,
	created_at TIMESTAMPTZ NOT NULL,
	PRIMARY KEY (company_id, embedding_version)
)
"
	.to_string()
}
