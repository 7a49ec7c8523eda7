//! Typed Paylocity WebLink endpoint helpers built on [`AuthorizedRequestExecutor`].
//!
//! Response bodies are returned as [`serde_json::Value`]; field schemas are owned by the API.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{self, CompanyId, EmployeeId},
	error::ConfigError,
	executor::{ApiRequest, AuthorizedRequestExecutor},
	flows::TokenManager,
	http::{ApiHttpClient, TransportErrorMapper},
};
#[cfg(feature = "reqwest")]
use crate::http::{ReqwestHttpClient, ReqwestTransportErrorMapper};

const EMPLOYEE_PAGE_SIZE: u32 = 100;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport stack.
pub type ReqwestPaylocityClient = PaylocityClient<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Endpoint helpers for one API client, optionally scoped to configured companies.
pub struct PaylocityClient<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	executor: AuthorizedRequestExecutor<C, M>,
	companies: Vec<CompanyId>,
}
impl<C, M> PaylocityClient<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Wraps an existing executor.
	pub fn new(executor: AuthorizedRequestExecutor<C, M>) -> Self {
		Self { executor, companies: Vec::new() }
	}

	/// Builds an executor around `manager` and wraps it.
	pub fn from_manager(manager: Arc<TokenManager<C, M>>) -> Self {
		Self::new(AuthorizedRequestExecutor::new(manager))
	}

	/// Configures the companies this client serves; the first one is the default.
	pub fn with_companies<I, T>(mut self, companies: I) -> Self
	where
		I: IntoIterator<Item = T>,
		T: Into<CompanyId>,
	{
		self.companies = companies.into_iter().map(Into::into).collect();

		self
	}

	/// Configured companies in order.
	pub fn companies(&self) -> &[CompanyId] {
		&self.companies
	}

	/// Underlying executor, for endpoints without a dedicated helper.
	pub fn executor(&self) -> &AuthorizedRequestExecutor<C, M> {
		&self.executor
	}

	/// Picks `company` when supplied, else the first configured company.
	pub fn resolve_company(&self, company: Option<&CompanyId>) -> Result<CompanyId> {
		company
			.or_else(|| self.companies.first())
			.cloned()
			.ok_or_else(|| ConfigError::NoCompanyConfigured.into())
	}

	/// `GET /api/v2/companies/{c}/employees`, first page of 100 with the total count.
	pub async fn get_all_employees(&self, company: Option<&CompanyId>) -> Result<Value> {
		let company = self.resolve_company(company)?;
		let request = ApiRequest::get(format!("{}/employees", company_path(&company)))
			.with_query("pagesize", EMPLOYEE_PAGE_SIZE)
			.with_query("pagenumber", 0)
			.with_query("includetotalcount", true);

		self.executor.execute(&request).await
	}

	/// `GET /api/v2/companies/{c}/employees/{e}`.
	pub async fn get_employee_details(
		&self,
		company: Option<&CompanyId>,
		employee: &EmployeeId,
	) -> Result<Value> {
		self.get_employee_resource(company, employee, "").await
	}

	/// `GET /api/v2/companies/{c}/employees/{e}/earnings`.
	pub async fn get_employee_earnings(
		&self,
		company: Option<&CompanyId>,
		employee: &EmployeeId,
	) -> Result<Value> {
		self.get_employee_resource(company, employee, "/earnings").await
	}

	/// `GET /api/v2/companies/{c}/employees/{e}/localTaxes`.
	pub async fn get_employee_local_taxes(
		&self,
		company: Option<&CompanyId>,
		employee: &EmployeeId,
	) -> Result<Value> {
		self.get_employee_resource(company, employee, "/localTaxes").await
	}

	/// `GET /api/v2/companies/{c}/employees/{e}/sensitivedata`.
	pub async fn get_employee_sensitive_data(
		&self,
		company: Option<&CompanyId>,
		employee: &EmployeeId,
	) -> Result<Value> {
		self.get_employee_resource(company, employee, "/sensitivedata").await
	}

	/// `GET /api/v2/companies/{c}/employees/{e}/paystatement/details/{year}/{check_date}`.
	pub async fn get_employee_paystatement_details(
		&self,
		company: Option<&CompanyId>,
		employee: &EmployeeId,
		year: i32,
		check_date: &str,
	) -> Result<Value> {
		auth::id::validate_view("Check date", check_date).map_err(ConfigError::from)?;

		self.get_employee_resource(
			company,
			employee,
			&format!("/paystatement/details/{year}/{check_date}"),
		)
		.await
	}

	/// `GET /api/v2/companies/{c}/codes/{resource}`.
	pub async fn get_company_codes(
		&self,
		company: Option<&CompanyId>,
		code_resource: &str,
	) -> Result<Value> {
		auth::id::validate_view("Code resource", code_resource).map_err(ConfigError::from)?;

		let company = self.resolve_company(company)?;
		let request = ApiRequest::get(format!("{}/codes/{code_resource}", company_path(&company)));

		self.executor.execute(&request).await
	}

	/// `GET /api/v2/companies/{c}/openapi` with `Accept: application/json`.
	pub async fn get_company_openapi_doc(&self, company: Option<&CompanyId>) -> Result<Value> {
		let company = self.resolve_company(company)?;
		let request = ApiRequest::get(format!("{}/openapi", company_path(&company)))
			.with_header("Accept", "application/json");

		self.executor.execute(&request).await
	}

	async fn get_employee_resource(
		&self,
		company: Option<&CompanyId>,
		employee: &EmployeeId,
		suffix: &str,
	) -> Result<Value> {
		let company = self.resolve_company(company)?;
		let request =
			ApiRequest::get(format!("{}/employees/{employee}{suffix}", company_path(&company)));

		self.executor.execute(&request).await
	}
}
impl<C, M> Debug for PaylocityClient<C, M>
where
	C: ?Sized + ApiHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PaylocityClient")
			.field("executor", &self.executor)
			.field("companies", &self.companies)
			.finish()
	}
}

fn company_path(company: &CompanyId) -> String {
	format!("/api/v2/companies/{company}")
}
