use crate::db::{Driver, ScopedConnection};
use crate::error::DashboardError;
use crate::types::supply::TableView;
use serde_json::Value;
use sqlx::Row;
use sqlx::any::AnyRow;
use tracing::debug;

/// Tables and views the dashboard can browse. Multi-valued attributes are
/// flattened to one row per element, except phone numbers and supply
/// preferences which are joined into a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseTable {
    Products,
    ProductBatches,
    Departments,
    Customers,
    TeamMembers,
    ChiefOfficers,
    LogisticTeams,
    DistributionCenters,
    BatchOrders,
    Complaints,
}

impl BrowseTable {
    pub const ALL: [BrowseTable; 10] = [
        BrowseTable::Products,
        BrowseTable::ProductBatches,
        BrowseTable::Departments,
        BrowseTable::Customers,
        BrowseTable::TeamMembers,
        BrowseTable::ChiefOfficers,
        BrowseTable::LogisticTeams,
        BrowseTable::DistributionCenters,
        BrowseTable::BatchOrders,
        BrowseTable::Complaints,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            BrowseTable::Products => "products",
            BrowseTable::ProductBatches => "product_batches",
            BrowseTable::Departments => "departments",
            BrowseTable::Customers => "customers",
            BrowseTable::TeamMembers => "team_members",
            BrowseTable::ChiefOfficers => "chief_officers",
            BrowseTable::LogisticTeams => "logistic_teams",
            BrowseTable::DistributionCenters => "distribution_centers",
            BrowseTable::BatchOrders => "batch_orders",
            BrowseTable::Complaints => "complaints",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            BrowseTable::Products => &["serial_no", "product_category", "expiry_date"],
            BrowseTable::ProductBatches => &[
                "batch_id",
                "quantity",
                "arrival_date",
                "product_serial_no",
                "product_category",
                "product_expiry_date",
                "center_name",
            ],
            BrowseTable::Departments => &[
                "department_id",
                "department_email",
                "department_fax",
                "department_phone_numbers",
                "supply_preference_serial_nos",
            ],
            BrowseTable::Customers => &[
                "customer_code",
                "department_id",
                "department_email",
                "department_fax",
                "department_phone_numbers",
            ],
            BrowseTable::TeamMembers => &[
                "tax_code",
                "member_name",
                "member_surname",
                "birth_date",
                "employment_date",
            ],
            BrowseTable::ChiefOfficers => &[
                "tax_code",
                "member_name",
                "member_surname",
                "birth_date",
                "employment_date",
                "start_date",
            ],
            BrowseTable::LogisticTeams => &[
                "team_code",
                "team_name",
                "chief_tax_code",
                "chief_name",
                "chief_surname",
                "completed_deliveries",
                "member_tax_code",
                "member_name",
                "member_surname",
                "member_birth_date",
                "member_employment_date",
            ],
            BrowseTable::DistributionCenters => &[
                "center_name",
                "product_serial_no",
                "product_category",
                "product_expiry_date",
            ],
            BrowseTable::BatchOrders => &[
                "order_id",
                "order_date",
                "expected_delivery_date",
                "delivery_status",
                "customer_code",
                "customer_city",
                "customer_street",
                "customer_zip_code",
                "logistic_team_code",
                "logistic_team_name",
            ],
            BrowseTable::Complaints => &[
                "ticket_id",
                "complaint_type",
                "complaint_start_date",
                "complaint_end_date",
                "customer_code",
                "customer_city",
                "customer_street",
                "batch_order_id",
                "batch_order_delivery_status",
                "batch_order_date",
            ],
        }
    }

    pub fn sql(self, driver: Driver) -> String {
        match self {
            BrowseTable::Products => r#"
                SELECT serial_no, product_category, CAST(expiry_date AS TEXT) AS expiry_date
                FROM product
                ORDER BY serial_no"#
                .to_string(),
            BrowseTable::ProductBatches => r#"
                SELECT pb.batch_id, pb.quantity, CAST(pb.arrival_date AS TEXT) AS arrival_date,
                       p.serial_no AS product_serial_no, p.product_category,
                       CAST(p.expiry_date AS TEXT) AS product_expiry_date, pb.center_name
                FROM product_batch pb
                JOIN product p ON p.serial_no = pb.serial_no
                ORDER BY pb.batch_id"#
                .to_string(),
            BrowseTable::Departments => format!(
                r#"
                SELECT d.department_id, d.email AS department_email, d.fax AS department_fax,
                       (SELECT {phones} FROM department_phone ph
                         WHERE ph.department_id = d.department_id) AS department_phone_numbers,
                       (SELECT {prefs} FROM department_supply_preference sp
                         WHERE sp.department_id = d.department_id) AS supply_preference_serial_nos
                FROM department d
                ORDER BY d.department_id"#,
                phones = driver.string_agg("ph.phone_number"),
                prefs = driver.string_agg("sp.serial_no"),
            ),
            BrowseTable::Customers => format!(
                r#"
                SELECT c.customer_code, d.department_id, d.email AS department_email,
                       d.fax AS department_fax,
                       (SELECT {phones} FROM department_phone ph
                         WHERE ph.department_id = d.department_id) AS department_phone_numbers
                FROM customer c
                JOIN customer_department cd ON cd.customer_code = c.customer_code
                JOIN department d ON d.department_id = cd.department_id
                ORDER BY c.customer_code, d.department_id"#,
                phones = driver.string_agg("ph.phone_number"),
            ),
            BrowseTable::TeamMembers => r#"
                SELECT tax_code, member_name, member_surname,
                       CAST(birth_date AS TEXT) AS birth_date,
                       CAST(employment_date AS TEXT) AS employment_date
                FROM team_member
                ORDER BY tax_code"#
                .to_string(),
            BrowseTable::ChiefOfficers => r#"
                SELECT tm.tax_code, tm.member_name, tm.member_surname,
                       CAST(tm.birth_date AS TEXT) AS birth_date,
                       CAST(tm.employment_date AS TEXT) AS employment_date,
                       CAST(co.start_date AS TEXT) AS start_date
                FROM chief_officer co
                JOIN team_member tm ON tm.tax_code = co.tax_code
                ORDER BY tm.tax_code"#
                .to_string(),
            BrowseTable::LogisticTeams => r#"
                SELECT lt.team_code, lt.team_name, chief.tax_code AS chief_tax_code,
                       chief.member_name AS chief_name, chief.member_surname AS chief_surname,
                       lt.completed_deliveries, m.tax_code AS member_tax_code,
                       m.member_name, m.member_surname,
                       CAST(m.birth_date AS TEXT) AS member_birth_date,
                       CAST(m.employment_date AS TEXT) AS member_employment_date
                FROM logistic_team lt
                LEFT JOIN team_member chief ON chief.tax_code = lt.chief_tax_code
                JOIN logistic_team_member ltm ON ltm.team_code = lt.team_code
                JOIN team_member m ON m.tax_code = ltm.tax_code
                ORDER BY lt.team_code, m.tax_code"#
                .to_string(),
            BrowseTable::DistributionCenters => r#"
                SELECT dc.center_name, p.serial_no AS product_serial_no, p.product_category,
                       CAST(p.expiry_date AS TEXT) AS product_expiry_date
                FROM distribution_center dc
                JOIN distribution_center_product dcp ON dcp.center_name = dc.center_name
                JOIN product p ON p.serial_no = dcp.serial_no
                ORDER BY dc.center_name, p.serial_no"#
                .to_string(),
            BrowseTable::BatchOrders => r#"
                SELECT bo.order_id, CAST(bo.order_date AS TEXT) AS order_date,
                       CAST(bo.expected_delivery_date AS TEXT) AS expected_delivery_date,
                       bo.delivery_status, c.customer_code, c.city AS customer_city,
                       c.street AS customer_street, c.zip_code AS customer_zip_code,
                       lt.team_code AS logistic_team_code, lt.team_name AS logistic_team_name
                FROM batch_order bo
                LEFT JOIN customer c ON c.customer_code = bo.customer_code
                LEFT JOIN logistic_team lt ON lt.team_code = bo.team_code
                ORDER BY bo.order_id"#
                .to_string(),
            BrowseTable::Complaints => r#"
                SELECT cp.ticket_id, cp.complaint_type,
                       CAST(cp.start_date AS TEXT) AS complaint_start_date,
                       CAST(cp.end_date AS TEXT) AS complaint_end_date,
                       c.customer_code, c.city AS customer_city, c.street AS customer_street,
                       bo.order_id AS batch_order_id,
                       bo.delivery_status AS batch_order_delivery_status,
                       CAST(bo.order_date AS TEXT) AS batch_order_date
                FROM complaint cp
                LEFT JOIN customer c ON c.customer_code = cp.customer_code
                LEFT JOIN batch_order bo ON bo.order_id = cp.order_id
                ORDER BY cp.ticket_id"#
                .to_string(),
        }
    }
}

pub fn table_names() -> Vec<&'static str> {
    BrowseTable::ALL.iter().map(|t| t.name()).collect()
}

pub async fn browse(
    conn: &mut ScopedConnection,
    table: BrowseTable,
) -> Result<TableView, DashboardError> {
    let sql = table.sql(conn.driver());
    let rows = sqlx::query(&sql).fetch_all(&mut **conn).await?;
    let columns = table.columns();
    let rows: Vec<Vec<Value>> = rows
        .iter()
        .map(|row| (0..columns.len()).map(|idx| cell(row, idx)).collect())
        .collect();
    debug!(table = table.name(), rows = rows.len(), "browsed table");
    Ok(TableView {
        name: table.name(),
        columns: columns.to_vec(),
        row_count: rows.len(),
        rows,
    })
}

fn cell(row: &AnyRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    Value::Null
}
