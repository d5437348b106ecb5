use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::ServiceError;
use crate::models::{AccessLog, AccessLogQueryParams, ListResponse, PageParams, UniqueVisitorsDto};
use crate::repositories::AccessLogRepositoryTrait;
use crate::utils::base62;

type Result<T> = std::result::Result<T, ServiceError>;

#[async_trait]
pub trait AccessLogServiceTrait: Send + Sync {
    async fn list(&self, query: AccessLogQueryParams) -> Result<ListResponse<AccessLog>>;
    async fn unique_visitors(&self, short_code: &str) -> Result<UniqueVisitorsDto>;
}

pub struct AccessLogService<R: AccessLogRepositoryTrait> {
    repository: Arc<R>,
}

impl<R: AccessLogRepositoryTrait> AccessLogService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }
}

fn check_code(short_code: &str) -> Result<()> {
    if !base62::is_valid_code(short_code) {
        return Err(ServiceError::MalformedInput(format!(
            "'{}' is not a valid short code",
            short_code
        )));
    }
    Ok(())
}

#[async_trait]
impl<R: AccessLogRepositoryTrait + 'static> AccessLogServiceTrait for AccessLogService<R> {
    async fn list(&self, query: AccessLogQueryParams) -> Result<ListResponse<AccessLog>> {
        if let Some(code) = &query.short_code {
            check_code(code)?;
        }

        let params = PageParams {
            page: query.page,
            limit: query.limit,
        };
        let logs = self
            .repository
            .list(query.short_code.clone(), params.limit(), params.offset())
            .await?;
        let total = self.repository.count(query.short_code).await?;

        Ok(ListResponse::new(logs, total, &params))
    }

    async fn unique_visitors(&self, short_code: &str) -> Result<UniqueVisitorsDto> {
        check_code(short_code)?;

        let unique_visitors = self.repository.count_unique_visitors(short_code).await?;
        Ok(UniqueVisitorsDto {
            short_code: short_code.to_string(),
            unique_visitors,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use mockall::predicate::eq;

    use super::*;
    use crate::models::Visitor;
    use crate::repositories::memory::InMemoryRepository;
    use crate::repositories::{MockAccessLogRepositoryTrait, ShortUrlRepositoryTrait};

    #[tokio::test]
    async fn test_unique_visitors_counts_addresses() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.seed("https://a.example", "AbC123", None);
        for ip in ["10.0.0.1", "10.0.0.2", "10.0.0.1"] {
            let access = Visitor::new(ip, "test").access_to("AbC123");
            repo.record_click("AbC123", &access, Utc::now()).await.unwrap();
        }

        let service = AccessLogService::new(repo);
        let dto = service.unique_visitors("AbC123").await.unwrap();

        assert_eq!(dto.unique_visitors, 2);
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.seed("https://a.example", "AbC123", None);
        repo.seed("https://b.example", "XyZ789", None);
        for code in ["AbC123", "XyZ789", "AbC123"] {
            let access = Visitor::new("10.0.0.1", "test").access_to(code);
            repo.record_click(code, &access, Utc::now()).await.unwrap();
        }

        let service = AccessLogService::new(repo);
        let page = service
            .list(AccessLogQueryParams {
                short_code: Some("AbC123".into()),
                page: Some(1),
                limit: Some(1),
            })
            .await
            .unwrap();

        assert_eq!(page.total, 2);
        assert_eq!(page.list.len(), 1);
        assert_eq!(page.list[0].short_code, "AbC123");
    }

    #[tokio::test]
    async fn test_invalid_code_is_rejected_before_query() {
        let mut repo = MockAccessLogRepositoryTrait::new();
        repo.expect_count_unique_visitors().never();

        let service = AccessLogService::new(Arc::new(repo));
        let err = service.unique_visitors("bad/code").await.unwrap_err();

        assert!(matches!(err, ServiceError::MalformedInput(_)));
    }

    #[tokio::test]
    async fn test_default_paging_is_forwarded() {
        let mut repo = MockAccessLogRepositoryTrait::new();
        repo.expect_list()
            .with(eq(None::<String>), eq(20), eq(0))
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));
        repo.expect_count().times(1).returning(|_| Ok(0));

        let service = AccessLogService::new(Arc::new(repo));
        let page = service.list(AccessLogQueryParams::default()).await.unwrap();

        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 20);
    }
}
