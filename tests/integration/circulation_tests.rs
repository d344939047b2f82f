//! Circulation flows end to end through the services

use library_circulation::{
    error::ErrorCode,
    models::{LoanStatus, MemberStatus},
    repository::Repository,
};
use tokio_test::{assert_err, assert_ok};

use crate::common::Fixture;

#[tokio::test]
async fn test_last_copy_scenario() {
    let fx = Fixture::new();
    let book = fx.book("9780441013593", 1).await;
    let ada = fx.member("MEM-1", "ada@example.org").await;
    let bob = fx.member("MEM-2", "bob@example.org").await;
    let circulation = &fx.services.circulation;

    let loan = assert_ok!(circulation.borrow(book.id(), ada.id(), None).await);
    assert_eq!(loan.status, LoanStatus::Active);

    let (book_now, ada_now) = fx.reload(book.id(), ada.id()).await;
    assert_eq!(book_now.available_copies, 0);
    assert_eq!(ada_now.active_loans, 1);

    let err = assert_err!(circulation.borrow(book.id(), ada.id(), None).await);
    assert_eq!(err.code(), ErrorCode::DuplicateActiveLoan);

    let err = assert_err!(circulation.borrow(book.id(), bob.id(), None).await);
    assert_eq!(err.code(), ErrorCode::BookNotAvailable);

    let (_, bob_now) = fx.reload(book.id(), bob.id()).await;
    assert_eq!(bob_now.active_loans, 0);
}

#[tokio::test]
async fn test_borrow_return_round_trip() {
    let fx = Fixture::new();
    let book = fx.book("9780441013593", 3).await;
    let member = fx.member("MEM-1", "ada@example.org").await;
    let circulation = &fx.services.circulation;

    let loan = circulation.borrow(book.id(), member.id(), Some("gift wrap".into())).await.unwrap();
    fx.clock.advance(5);
    let returned = circulation.return_book(loan.id).await.unwrap();

    assert_eq!(returned.status, LoanStatus::Returned);
    assert_eq!(returned.return_date, Some(fx.clock_today()));
    assert_eq!(returned.notes.as_deref(), Some("gift wrap"));

    let (book_now, member_now) = fx.reload(book.id(), member.id()).await;
    assert_eq!(book_now.available_copies, book.available_copies);
    assert_eq!(member_now.active_loans, member.active_loans);

    // The pair may borrow again once the loan is closed
    assert_ok!(circulation.borrow(book.id(), member.id(), None).await);
}

#[tokio::test]
async fn test_active_loans_matches_open_loans() {
    let fx = Fixture::new();
    let member = fx.member("MEM-1", "ada@example.org").await;
    let circulation = &fx.services.circulation;

    let mut loans = Vec::new();
    for isbn in ["9780000000001", "9780000000002", "9780000000003", "9780000000004"] {
        let book = fx.book(isbn, 2).await;
        loans.push(circulation.borrow(book.id(), member.id(), None).await.unwrap());
    }

    circulation.return_book(loans[0].id).await.unwrap();
    circulation.mark_as_lost(loans[1].id).await.unwrap();
    fx.clock.advance(20);
    circulation.sweep_overdue().await.unwrap();
    circulation.return_book(loans[2].id).await.unwrap();

    let (_, member_now) = fx.reload(loans[3].book_id, member.id()).await;
    assert_eq!(member_now.active_loans, 1);
    assert_eq!(fx.open_loans_of(member.id()).await, 1);

    for loan in &loans {
        let (book_now, _) = fx.reload(loan.book_id, member.id()).await;
        assert!(book_now.available_copies >= 0);
        assert!(book_now.available_copies <= book_now.total_copies);
    }
}

#[tokio::test]
async fn test_quota_is_enforced() {
    let fx = Fixture::new();
    let member = fx.member("MEM-1", "ada@example.org").await;
    let circulation = &fx.services.circulation;

    for n in 0..5 {
        let book = fx.book(&format!("978000000010{}", n), 1).await;
        circulation.borrow(book.id(), member.id(), None).await.unwrap();
    }
    let extra = fx.book("9780000000200", 1).await;
    let err = circulation.borrow(extra.id(), member.id(), None).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::MemberCannotBorrow);

    let (extra_now, _) = fx.reload(extra.id(), member.id()).await;
    assert_eq!(extra_now.available_copies, 1);
}

#[tokio::test]
async fn test_expired_membership_cannot_borrow() {
    let fx = Fixture::new();
    let book = fx.book("9780441013593", 1).await;
    let member = fx.member("MEM-1", "ada@example.org").await;

    fx.clock.advance(400);
    let err = fx
        .services
        .circulation
        .borrow(book.id(), member.id(), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::MemberCannotBorrow);

    let renewed = fx.services.members.renew_membership(member.id(), None).await.unwrap();
    assert_eq!(renewed.status, MemberStatus::Active);
    assert_ok!(fx.services.circulation.borrow(book.id(), member.id(), None).await);
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let fx = Fixture::new();
    let book = fx.book("9780441013593", 1).await;
    let circulation = &fx.services.circulation;

    let err = circulation.borrow(book.id(), 999, None).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
    let err = circulation.borrow(999, 1, None).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
    let err = circulation.return_book(999).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
    let err = circulation.renew(999).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn test_renewal_cap() {
    let fx = Fixture::new();
    let book = fx.book("9780441013593", 1).await;
    let member = fx.member("MEM-1", "ada@example.org").await;
    let circulation = &fx.services.circulation;

    let loan = circulation.borrow(book.id(), member.id(), None).await.unwrap();
    let first = circulation.renew(loan.id).await.unwrap();
    assert_eq!(first.renewal_count, 1);
    fx.clock.advance(7);
    let second = circulation.renew(loan.id).await.unwrap();
    assert_eq!(second.renewal_count, 2);
    assert_eq!(second.due_date, fx.clock_today() + chrono::Duration::days(14));
    assert!(!second.can_renew);

    let err = circulation.renew(loan.id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::LoanCannotBeRenewed);
    let unchanged = circulation.get_loan(loan.id).await.unwrap();
    assert_eq!(unchanged.renewal_count, 2);
    assert_eq!(unchanged.due_date, second.due_date);
}

#[tokio::test]
async fn test_overdue_by_three_days() {
    let fx = Fixture::new();
    let book = fx.book("9780441013593", 1).await;
    let member = fx.member("MEM-1", "ada@example.org").await;
    let circulation = &fx.services.circulation;

    let loan = circulation.borrow(book.id(), member.id(), None).await.unwrap();
    fx.clock.advance(17);

    let details = circulation.get_loan(loan.id).await.unwrap();
    assert!(details.is_overdue);
    assert_eq!(details.days_overdue, 3);
    assert_eq!(details.days_until_due, -3);
    assert!(!details.can_renew);

    let overdue = circulation.overdue_loans().await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].id, loan.id);
}

#[tokio::test]
async fn test_sweep_is_idempotent() {
    let fx = Fixture::new();
    let member = fx.member("MEM-1", "ada@example.org").await;
    let circulation = &fx.services.circulation;

    let late = fx.book("9780000000001", 1).await;
    let late_loan = circulation.borrow(late.id(), member.id(), None).await.unwrap();
    fx.clock.advance(10);
    let fresh = fx.book("9780000000002", 1).await;
    circulation.borrow(fresh.id(), member.id(), None).await.unwrap();
    fx.clock.advance(5);

    assert_eq!(circulation.sweep_overdue().await.unwrap(), 1);
    let once: Vec<i64> = circulation
        .loans_by_status(LoanStatus::Overdue)
        .await
        .unwrap()
        .iter()
        .map(|l| l.id)
        .collect();

    assert_eq!(circulation.sweep_overdue().await.unwrap(), 0);
    let twice: Vec<i64> = circulation
        .loans_by_status(LoanStatus::Overdue)
        .await
        .unwrap()
        .iter()
        .map(|l| l.id)
        .collect();

    assert_eq!(once, vec![late_loan.id]);
    assert_eq!(once, twice);

    // An overdue loan can still be returned
    let returned = circulation.return_book(late_loan.id).await.unwrap();
    assert_eq!(returned.status, LoanStatus::Returned);
    assert!(circulation.loans_by_status(LoanStatus::Overdue).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_copy_count_changes() {
    let fx = Fixture::new();
    let book = fx.book("9780441013593", 3).await;
    let ada = fx.member("MEM-1", "ada@example.org").await;
    let bob = fx.member("MEM-2", "bob@example.org").await;
    let circulation = &fx.services.circulation;

    circulation.borrow(book.id(), ada.id(), None).await.unwrap();
    circulation.borrow(book.id(), bob.id(), None).await.unwrap();

    let err = circulation.update_copy_count(book.id(), 1).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::BelowLoanedCopies);

    let exact = circulation.update_copy_count(book.id(), 2).await.unwrap();
    assert_eq!((exact.total_copies, exact.available_copies), (2, 0));

    let grown = circulation.update_copy_count(book.id(), 6).await.unwrap();
    assert_eq!((grown.total_copies, grown.available_copies), (6, 4));
}

#[tokio::test]
async fn test_copy_count_keeps_at_least_one_copy() {
    let fx = Fixture::new();
    let book = fx.book("9780441013593", 2).await;
    let circulation = &fx.services.circulation;

    for total in [0, -3] {
        let err = assert_err!(circulation.update_copy_count(book.id(), total).await);
        assert_eq!(err.code(), ErrorCode::BadValue);
    }

    let book_now = fx.services.catalog.get_book(book.id()).await.unwrap();
    assert_eq!((book_now.total_copies, book_now.available_copies), (2, 2));
}

#[tokio::test]
async fn test_mark_as_lost_writes_off_copy() {
    let fx = Fixture::new();
    let book = fx.book("9780441013593", 2).await;
    let member = fx.member("MEM-1", "ada@example.org").await;
    let circulation = &fx.services.circulation;

    let loan = circulation.borrow(book.id(), member.id(), None).await.unwrap();
    let (before_book, before_member) = fx.reload(book.id(), member.id()).await;

    let lost = circulation.mark_as_lost(loan.id).await.unwrap();
    assert_eq!(lost.status, LoanStatus::Lost);

    let (after_book, after_member) = fx.reload(book.id(), member.id()).await;
    assert_eq!(after_member.active_loans, before_member.active_loans - 1);
    assert_eq!(after_book.total_copies, before_book.total_copies - 1);
    assert_eq!(after_book.available_copies, before_book.available_copies);

    let err = circulation.return_book(loan.id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::LoanLost);
}

#[tokio::test]
async fn test_returned_loan_cannot_be_lost() {
    let fx = Fixture::new();
    let book = fx.book("9780441013593", 1).await;
    let member = fx.member("MEM-1", "ada@example.org").await;
    let circulation = &fx.services.circulation;

    let loan = circulation.borrow(book.id(), member.id(), None).await.unwrap();
    circulation.return_book(loan.id).await.unwrap();

    let err = circulation.mark_as_lost(loan.id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::LoanAlreadyReturned);
    let err = circulation.renew(loan.id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::LoanCannotBeRenewed);

    let (book_now, _) = fx.reload(book.id(), member.id()).await;
    assert_eq!((book_now.total_copies, book_now.available_copies), (1, 1));
}

#[tokio::test]
async fn test_concurrent_borrows_of_last_copy() {
    let fx = Fixture::new();
    let book = fx.book("9780441013593", 1).await;
    let mut members = Vec::new();
    for n in 0..8 {
        members.push(fx.member(&format!("MEM-{}", n), &format!("m{}@example.org", n)).await);
    }

    let handles: Vec<_> = members
        .iter()
        .map(|m| {
            let circulation = fx.services.circulation.clone();
            let (book_id, member_id) = (book.id(), m.id());
            tokio::spawn(async move { circulation.borrow(book_id, member_id, None).await })
        })
        .collect();

    let mut granted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => granted += 1,
            Err(e) => assert_eq!(e.code(), ErrorCode::BookNotAvailable),
        }
    }
    assert_eq!(granted, 1);

    let (book_now, _) = fx.reload(book.id(), members[0].id()).await;
    assert_eq!(book_now.available_copies, 0);

    let mut uow = fx.repository.begin().await.unwrap();
    let open = uow.loans().find_by_book(book.id()).await.unwrap();
    assert_eq!(open.len(), 1);
}

#[tokio::test]
async fn test_member_with_open_loans_cannot_be_deleted() {
    let fx = Fixture::new();
    let book = fx.book("9780441013593", 1).await;
    let member = fx.member("MEM-1", "ada@example.org").await;

    let loan = fx.services.circulation.borrow(book.id(), member.id(), None).await.unwrap();
    let err = fx.services.members.delete_member(member.id()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::MemberHasActiveLoans);
    let err = fx.services.catalog.delete_book(book.id()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::BookHasLoanedCopies);

    fx.services.circulation.return_book(loan.id).await.unwrap();
    assert_ok!(fx.services.members.delete_member(member.id()).await);
    let history = fx.services.circulation.loans_for_book(book.id()).await.unwrap();
    assert!(history.is_empty());
}
