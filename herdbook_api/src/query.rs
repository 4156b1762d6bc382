//! List query builder: pagination, sorting, and search parameters.

use url::Url;

/// Sort order for list endpoints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending order. This is the default.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Pagination, sorting, and search parameters shared by every list endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListQuery {
    /// Page number (1-indexed). Defaults to 1.
    pub page: u64,
    /// Results per page. `None` uses the server default.
    pub limit: Option<u64>,
    /// Field to sort by. `None` uses the server default ordering.
    pub sort_by: Option<String>,
    /// Sort direction. Only sent when `sort_by` is set.
    pub sort_order: SortOrder,
    /// Free-text search term.
    pub search: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: None,
            sort_by: None,
            sort_order: SortOrder::Asc,
            search: None,
        }
    }
}

impl ListQuery {
    /// Sets the page number (1-indexed; 0 is clamped to 1).
    pub fn with_page(mut self, page: u64) -> Self {
        self.page = page.max(1);
        self
    }

    /// Sets the number of results per page.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the sort field and direction.
    pub fn with_sort(mut self, sort_by: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(sort_by.into());
        self.sort_order = order;
        self
    }

    /// Sets the free-text search term. An empty term clears it.
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let term = search.into();
        self.search = if term.is_empty() { None } else { Some(term) };
        self
    }

    /// Appends this query's parameters to the given URL, returning the modified URL.
    pub fn add_to_url(&self, url: &Url) -> Url {
        let mut url = url.clone();
        url.query_pairs_mut()
            .append_pair("page", &self.page.to_string());
        if let Some(limit) = self.limit {
            url.query_pairs_mut()
                .append_pair("limit", &limit.to_string());
        }
        if let Some(sort_by) = &self.sort_by {
            url.query_pairs_mut()
                .append_pair("sortBy", sort_by)
                .append_pair("sortOrder", self.sort_order.as_str());
        }
        if let Some(search) = &self.search {
            url.query_pairs_mut().append_pair("search", search);
        }
        url
    }
}
