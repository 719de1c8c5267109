mod platforms;
mod reviews;
mod titles;

pub use platforms::PlatformRepo;
pub use reviews::{ReviewRepo, ReviewWithUser};
pub use titles::TitleRepo;

use sea_orm::{ConnectionTrait, Paginator, SelectorTrait};

use crate::{
    error::{AppError, AppResult},
    models::PageQuery,
};

/// 1-based page number and page size.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Paging {
    pub page: u64,
    pub size: u64,
}

impl Paging {
    pub fn resolve(query: PageQuery, default_size: u64, max_size: u64) -> AppResult<Self> {
        let page = query.page.unwrap_or(1);
        if page == 0 {
            return Err(AppError::validation("page must be at least 1"));
        }
        let size = query.page_size.unwrap_or(default_size).clamp(1, max_size.max(1));
        Ok(Self { page, size })
    }
}

#[derive(Debug)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub count: u64,
    pub pages: u64,
    pub paging: Paging,
}

impl<T> Paged<T> {
    pub fn has_next(&self) -> bool {
        self.paging.page < self.pages
    }

    pub fn has_previous(&self) -> bool {
        self.paging.page > 1
    }
}

async fn fetch_page<'db, C, S>(
    paginator: Paginator<'db, C, S>,
    paging: Paging,
) -> AppResult<Paged<S::Item>>
where
    C: ConnectionTrait,
    S: SelectorTrait + 'db,
{
    let totals = paginator.num_items_and_pages().await?;
    if paging.page > 1 && paging.page > totals.number_of_pages {
        return Err(AppError::NotFound("invalid page".to_string()));
    }

    let items = paginator.fetch_page(paging.page - 1).await?;
    Ok(Paged {
        items,
        count: totals.number_of_items,
        pages: totals.number_of_pages,
        paging,
    })
}

pub fn now_sec() -> i64 {
    jiff::Timestamp::now().as_second()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_paging_defaults_and_bounds() {
        let p = Paging::resolve(PageQuery::default(), 10, 100).unwrap();
        assert_eq!(p, Paging { page: 1, size: 10 });

        let query = PageQuery { page: Some(3), page_size: Some(500) };
        let p = Paging::resolve(query, 10, 100).unwrap();
        assert_eq!(p, Paging { page: 3, size: 100 });

        let p = Paging::resolve(PageQuery { page: None, page_size: Some(0) }, 10, 100).unwrap();
        assert_eq!(p.size, 1);

        assert!(Paging::resolve(PageQuery { page: Some(0), page_size: None }, 10, 100).is_err());
    }
}
