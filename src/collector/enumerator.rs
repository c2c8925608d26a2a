//! Project and branch enumeration

use super::outcome::{CollectError, StepContext};
use crate::api::types::{Branch, ProjectComponent};
use crate::api::SonarClient;
use crate::models::Step;
use crate::pagination::{paginate, PageLimits, StopReason};
use tracing::{debug, warn};

/// Items plus whatever went wrong while listing them
#[derive(Debug, Clone)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub errors: Vec<CollectError>,
}

pub struct Enumerator<'a> {
    client: &'a SonarClient,
    project_limits: PageLimits,
}

impl<'a> Enumerator<'a> {
    pub fn new(client: &'a SonarClient, project_limits: PageLimits) -> Self {
        Self {
            client,
            project_limits,
        }
    }

    /// Every visible project, in server order. A failed page keeps the
    /// projects already listed.
    pub fn projects(&self) -> Listing<ProjectComponent> {
        let listing = paginate(self.project_limits, |page, size| {
            self.client.projects_page(page, size)
        });

        if listing.stop == StopReason::Ceiling {
            warn!(
                "Stopped listing projects after {} pages ({} of {} listed)",
                listing.pages_fetched,
                listing.items.len(),
                listing.reported_total
            );
        }

        let errors = listing
            .error
            .map(|e| CollectError::classify(StepContext::run(Step::Projects), e))
            .into_iter()
            .collect();

        debug!("Listed {} projects", listing.items.len());
        Listing {
            items: listing.items,
            errors,
        }
    }

    /// Branches of one project. Never empty: an empty or failed listing
    /// yields a single synthesised `main`.
    pub fn branches(&self, project: &str) -> Listing<Branch> {
        let mut errors = Vec::new();
        let mut branches = match self.client.branches(project) {
            Ok(branches) => branches,
            Err(e) => {
                let err = CollectError::classify(StepContext::project(project, Step::Branches), e);
                warn!("{}", err);
                errors.push(err);
                Vec::new()
            }
        };

        if branches.is_empty() {
            debug!("{}: no branches listed, assuming main", project);
            branches.push(Branch::synthesized_main());
        }

        Listing {
            items: branches,
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ApiRequest, ApiResult, ClientConfig, Transport};
    use serde_json::{json, Value};

    struct Projects {
        total: u64,
        fail_on_page: Option<u32>,
    }

    impl Transport for Projects {
        fn get(&self, request: &ApiRequest) -> ApiResult<Value> {
            match request.path.as_str() {
                "/api/projects/search" => {
                    let page: u32 = request.query_value("p").unwrap_or("1").parse().unwrap();
                    let size: u64 = request.query_value("ps").unwrap_or("500").parse().unwrap();
                    if Some(page) == self.fail_on_page {
                        return Err(ApiError::Server { status: 503 });
                    }
                    let start = (u64::from(page) - 1) * size;
                    let end = (start + size).min(self.total);
                    let components: Vec<Value> = (start..end)
                        .map(|i| json!({"key": format!("p{i}"), "name": format!("Project {i}")}))
                        .collect();
                    Ok(json!({
                        "paging": {"pageIndex": page, "pageSize": size, "total": self.total},
                        "components": components
                    }))
                }
                "/api/project_branches/list" => match request.query_value("project") {
                    Some("empty") => Ok(json!({"branches": []})),
                    Some("broken") => Err(ApiError::Connectivity("timed out".to_string())),
                    _ => Ok(json!({"branches": [
                        {"name": "main", "isMain": true},
                        {"name": "feature/x", "isMain": false}
                    ]})),
                },
                other => Err(ApiError::NotFound {
                    path: other.to_string(),
                }),
            }
        }
    }

    fn client(total: u64, fail_on_page: Option<u32>) -> SonarClient {
        SonarClient::new(
            Projects {
                total,
                fail_on_page,
            },
            ClientConfig::new("http://sonar.local", "t"),
        )
    }

    #[test]
    fn test_lists_all_projects_across_pages() {
        let c = client(7, None);
        let listing = Enumerator::new(&c, PageLimits::new(3, 10)).projects();
        assert_eq!(listing.items.len(), 7);
        assert_eq!(listing.items[6].key, "p6");
        assert!(listing.errors.is_empty());
    }

    #[test]
    fn test_failed_page_keeps_earlier_projects() {
        let c = client(10, Some(2));
        let listing = Enumerator::new(&c, PageLimits::new(3, 10)).projects();
        assert_eq!(listing.items.len(), 3);
        assert_eq!(listing.errors.len(), 1);
        assert!(!listing.errors[0].drops_unit());
    }

    #[test]
    fn test_empty_branch_list_synthesises_main() {
        let c = client(0, None);
        let listing = Enumerator::new(&c, PageLimits::new(500, 1)).branches("empty");
        assert_eq!(listing.items, vec![Branch::synthesized_main()]);
        assert!(listing.errors.is_empty());
    }

    #[test]
    fn test_failed_branch_list_synthesises_main() {
        let c = client(0, None);
        let listing = Enumerator::new(&c, PageLimits::new(500, 1)).branches("broken");
        assert_eq!(listing.items.len(), 1);
        assert!(listing.items[0].is_main);
        assert_eq!(listing.errors.len(), 1);
        assert_eq!(listing.errors[0].context().step, Step::Branches);
    }

    #[test]
    fn test_listed_branches_kept_in_order() {
        let c = client(0, None);
        let listing = Enumerator::new(&c, PageLimits::new(500, 1)).branches("svc");
        let names: Vec<_> = listing.items.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["main", "feature/x"]);
    }
}
