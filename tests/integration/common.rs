//! Shared fixtures

use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDate};
use library_circulation::{
    clock::Clock,
    config::{AppConfig, CirculationConfig, DatabaseConfig, LoggingConfig, ServerConfig},
    models::{Book, Member},
    repository::{MemoryRepository, Repository},
    services::Services,
    AppState,
};

/// Clock the tests move by hand
#[derive(Clone)]
pub struct TestClock(Arc<Mutex<NaiveDate>>);

impl TestClock {
    pub fn at(date: NaiveDate) -> Self {
        Self(Arc::new(Mutex::new(date)))
    }

    pub fn advance(&self, days: i64) {
        let mut today = self.0.lock().unwrap();
        *today += Duration::days(days);
    }
}

impl Clock for TestClock {
    fn today(&self) -> NaiveDate {
        *self.0.lock().unwrap()
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub struct Fixture {
    pub repository: MemoryRepository,
    pub clock: TestClock,
    pub services: Services,
}

impl Fixture {
    pub fn new() -> Self {
        let repository = MemoryRepository::new();
        let clock = TestClock::at(date(2024, 3, 1));
        let services = Services::new(
            Arc::new(repository.clone()),
            &CirculationConfig::default(),
            Arc::new(clock.clone()),
        );
        Self {
            repository,
            clock,
            services,
        }
    }

    pub fn clock_today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn state(&self) -> AppState {
        AppState {
            config: Arc::new(AppConfig {
                server: ServerConfig::default(),
                database: DatabaseConfig::default(),
                logging: LoggingConfig::default(),
                circulation: CirculationConfig::default(),
            }),
            services: Arc::new(self.services.clone()),
        }
    }

    pub async fn book(&self, isbn: &str, copies: i32) -> Book {
        let mut uow = self.repository.begin().await.unwrap();
        let book = uow
            .books()
            .save(Book::new(isbn, format!("Title {}", isbn), "Author", copies))
            .await
            .unwrap();
        uow.commit().await.unwrap();
        book
    }

    pub async fn member(&self, number: &str, email: &str) -> Member {
        let mut uow = self.repository.begin().await.unwrap();
        let member = uow
            .members()
            .save(Member::new(
                number,
                "Test",
                number,
                email,
                self.clock.today(),
                1,
            ))
            .await
            .unwrap();
        uow.commit().await.unwrap();
        member
    }

    pub async fn reload(&self, book_id: i64, member_id: i64) -> (Book, Member) {
        let mut uow = self.repository.begin().await.unwrap();
        let book = uow.books().get(book_id).await.unwrap().unwrap();
        let member = uow.members().get(member_id).await.unwrap().unwrap();
        (book, member)
    }

    /// Open loans of a member counted from the loan store
    pub async fn open_loans_of(&self, member_id: i64) -> i32 {
        let mut uow = self.repository.begin().await.unwrap();
        uow.loans()
            .find_by_member(member_id, true)
            .await
            .unwrap()
            .len() as i32
    }
}
