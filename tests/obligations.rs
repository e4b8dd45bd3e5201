use anyhow::Result;
use host_obligations::{
    error::Error,
    host::RESUBMISSION_TIMEOUT,
    obligation::ContractObligation,
    test_utils::{
        TEST_TOTAL_STORAGE, add_new_obligation, assert_ledger_consistent, new_mock_host,
        new_obligation, new_revision_transaction, test_settings,
    },
    types::{Currency, FileContractId},
};

#[tokio::test]
async fn test_add_obligation() -> Result<()> {
    let (host, _, files, persister) = new_mock_host(test_settings());
    let co = add_new_obligation(&host, &files, 1000, 50, 100, 110).await?;

    let ledger = host.ledger();
    assert_eq!(ledger.space_remaining, TEST_TOTAL_STORAGE - 1000);
    assert_eq!(ledger.anticipated_revenue, Currency::new(50));
    assert_eq!(host.action_items(), vec![(RESUBMISSION_TIMEOUT, co.id())]);
    assert_eq!(host.obligation(&co.id()), Some(co));
    assert_eq!(persister.save_count(), 1);
    assert_ledger_consistent(&host);
    Ok(())
}

#[tokio::test]
async fn test_revise_obligation_replaces_terms() -> Result<()> {
    let (host, _, files, persister) = new_mock_host(test_settings());
    let co = add_new_obligation(&host, &files, 1000, 50, 100, 110).await?;

    host.revise_obligation(new_revision_transaction(co.id(), 1, 1500, 70))
        .await?;

    let ledger = host.ledger();
    assert_eq!(ledger.space_remaining, TEST_TOTAL_STORAGE - 1500);
    assert_eq!(ledger.anticipated_revenue, Currency::new(70));
    let revised = host.obligation(&co.id()).unwrap();
    assert!(revised.has_revision());
    assert!(!revised.revision_confirmed);
    assert_eq!(revised.file_size(), 1500);
    assert_eq!(host.action_items(), vec![(RESUBMISSION_TIMEOUT, co.id())]);
    assert_eq!(persister.save_count(), 2);
    assert_ledger_consistent(&host);
    Ok(())
}

#[tokio::test]
async fn test_remove_successful_obligation() -> Result<()> {
    let (host, _, files, _) = new_mock_host(test_settings());
    let co = add_new_obligation(&host, &files, 1000, 50, 100, 110).await?;
    host.revise_obligation(new_revision_transaction(co.id(), 1, 1500, 70))
        .await?;
    files.insert(co.path(), 1500);

    host.remove_obligation(&co.id(), true).await?;

    let ledger = host.ledger();
    assert_eq!(ledger.space_remaining, TEST_TOTAL_STORAGE);
    assert_eq!(ledger.revenue, Currency::new(70));
    assert_eq!(ledger.lost_revenue, Currency::ZERO);
    assert_eq!(ledger.anticipated_revenue, Currency::ZERO);
    assert_eq!(host.obligation(&co.id()), None);
    assert!(host.action_items().is_empty());
    assert!(!files.contains(co.path()));
    Ok(())
}

#[tokio::test]
async fn test_remove_failed_obligation() -> Result<()> {
    let (host, _, files, _) = new_mock_host(test_settings());
    let co = add_new_obligation(&host, &files, 1000, 50, 100, 110).await?;
    host.revise_obligation(new_revision_transaction(co.id(), 1, 1500, 70))
        .await?;
    files.insert(co.path(), 1500);

    host.remove_obligation(&co.id(), false).await?;

    let ledger = host.ledger();
    assert_eq!(ledger.space_remaining, TEST_TOTAL_STORAGE);
    assert_eq!(ledger.revenue, Currency::ZERO);
    assert_eq!(ledger.lost_revenue, Currency::new(70));
    assert_eq!(ledger.anticipated_revenue, Currency::ZERO);
    assert_eq!(host.obligation_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_remove_credits_size_on_disk() -> Result<()> {
    let (host, _, files, _) = new_mock_host(test_settings());
    let co = add_new_obligation(&host, &files, 1000, 50, 100, 110).await?;
    files.insert(co.path(), 640);

    host.remove_obligation(&co.id(), true).await?;
    assert_eq!(host.ledger().space_remaining, TEST_TOTAL_STORAGE - 1000 + 640);
    Ok(())
}

#[tokio::test]
async fn test_remove_with_missing_file() -> Result<()> {
    let (host, _, _, _) = new_mock_host(test_settings());
    let co = new_obligation(1000, 50, 100, 110);
    host.add_obligation(co.clone()).await?;

    host.remove_obligation(&co.id(), true).await?;

    let ledger = host.ledger();
    assert_eq!(ledger.space_remaining, TEST_TOTAL_STORAGE - 1000);
    assert_eq!(ledger.revenue, Currency::new(50));
    assert_eq!(host.obligation_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_remove_failure_keeps_space_reserved() -> Result<()> {
    let (host, _, files, _) = new_mock_host(test_settings());
    let co = add_new_obligation(&host, &files, 1000, 50, 100, 110).await?;
    files.set_fail_remove(true);

    host.remove_obligation(&co.id(), false).await?;

    let ledger = host.ledger();
    assert_eq!(ledger.space_remaining, TEST_TOTAL_STORAGE - 1000);
    assert_eq!(ledger.lost_revenue, Currency::new(50));
    assert_eq!(ledger.anticipated_revenue, Currency::ZERO);
    assert_eq!(host.obligation_count(), 0);
    assert!(files.contains(co.path()));
    Ok(())
}

#[tokio::test]
async fn test_remove_unknown_obligation() -> Result<()> {
    let (host, _, _, persister) = new_mock_host(test_settings());
    let id = FileContractId::from_byte_array([7; 32]);
    assert_eq!(
        host.remove_obligation(&id, true).await,
        Err(Error::UnknownObligation(id))
    );
    assert_eq!(persister.save_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_rollback_requires_reconfirmation() -> Result<()> {
    let (host, chain, files, _) = new_mock_host(test_settings());
    let co = add_new_obligation(&host, &files, 1000, 50, 100, 110).await?;
    let revision = new_revision_transaction(co.id(), 1, 1000, 50);
    host.revise_obligation(revision.clone()).await?;
    chain.confirm(co.origin_transaction());
    chain.confirm(&revision);

    host.process_block(2).await;
    assert!(host.obligation(&co.id()).unwrap().txns_confirmed());

    host.handle_rollback(1).await;
    let reset = host.obligation(&co.id()).unwrap();
    assert!(!reset.origin_confirmed);
    assert!(!reset.revision_confirmed);
    assert!(!reset.txns_confirmed());
    assert_eq!(host.block_height(), 1);
    assert!(host.action_items().contains(&(2, co.id())));

    chain.unconfirm(&revision);
    host.process_block(2).await;
    let partial = host.obligation(&co.id()).unwrap();
    assert!(partial.origin_confirmed);
    assert!(!partial.txns_confirmed());

    chain.confirm(&revision);
    host.process_block(3).await;
    host.process_block(4).await;
    assert!(host.obligation(&co.id()).unwrap().txns_confirmed());
    assert_ledger_consistent(&host);
    Ok(())
}

#[tokio::test]
async fn test_persistence_failure_is_not_fatal() -> Result<()> {
    let (host, _, files, persister) = new_mock_host(test_settings());
    persister.set_fail(true);

    let co = add_new_obligation(&host, &files, 1000, 50, 100, 110).await?;
    host.revise_obligation(new_revision_transaction(co.id(), 1, 2000, 80))
        .await?;
    assert_eq!(persister.save_count(), 0);
    assert_eq!(host.ledger().anticipated_revenue, Currency::new(80));

    persister.set_fail(false);
    host.save().await;
    assert_eq!(persister.last(), Some(host.snapshot()));
    Ok(())
}

#[tokio::test]
async fn test_ledger_stays_consistent() -> Result<()> {
    let (host, _, files, _) = new_mock_host(test_settings());
    let a = add_new_obligation(&host, &files, 1000, 50, 100, 110).await?;
    let b = add_new_obligation(&host, &files, 3000, 20, 100, 110).await?;
    let c = add_new_obligation(&host, &files, 500, 5, 100, 110).await?;
    assert_ledger_consistent(&host);

    host.revise_obligation(new_revision_transaction(b.id(), 1, 4000, 25))
        .await?;
    host.revise_obligation(new_revision_transaction(b.id(), 2, 4500, 30))
        .await?;
    assert_ledger_consistent(&host);
    assert_eq!(host.ledger().anticipated_revenue, Currency::new(85));

    files.insert(b.path(), 4500);
    host.remove_obligation(&a.id(), true).await?;
    host.remove_obligation(&b.id(), false).await?;
    assert_ledger_consistent(&host);

    let ledger = host.ledger();
    assert_eq!(ledger.anticipated_revenue, Currency::new(5));
    assert_eq!(ledger.revenue, Currency::new(50));
    assert_eq!(ledger.lost_revenue, Currency::new(30));
    assert_eq!(ledger.space_remaining, TEST_TOTAL_STORAGE - c.file_size() as i64);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_revisions() -> Result<()> {
    let (host, _, files, _) = new_mock_host(test_settings());
    let co = add_new_obligation(&host, &files, 1000, 50, 100, 110).await?;

    let handles: Vec<_> = (1..=16u64)
        .map(|n| {
            let host = host.clone();
            let id = co.id();
            tokio::spawn(async move {
                host.revise_obligation(new_revision_transaction(id, n, 1000 + n, 50 + n))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await??;
    }

    let revised = host.obligation(&co.id()).unwrap();
    let ledger = host.ledger();
    assert_eq!(ledger.anticipated_revenue, revised.value());
    assert_eq!(
        ledger.space_remaining,
        TEST_TOTAL_STORAGE - revised.file_size() as i64
    );
    Ok(())
}

#[tokio::test]
#[cfg_attr(debug_assertions, should_panic(expected = "invariant violation"))]
async fn test_add_duplicate_obligation() {
    let (host, _, files, _) = new_mock_host(test_settings());
    let co = add_new_obligation(&host, &files, 1000, 50, 100, 110)
        .await
        .unwrap();

    assert_eq!(
        host.add_obligation(co.clone()).await,
        Err(Error::DuplicateObligation(co.id()))
    );
    assert_eq!(host.ledger().anticipated_revenue, Currency::new(50));
}

#[tokio::test]
#[cfg_attr(debug_assertions, should_panic(expected = "invariant violation"))]
async fn test_add_obligation_with_revision() {
    let (host, _, _, _) = new_mock_host(test_settings());
    let mut co = new_obligation(1000, 50, 100, 110);
    co.apply_revision(new_revision_transaction(co.id(), 1, 1000, 50))
        .unwrap();

    assert_eq!(
        host.add_obligation(co.clone()).await,
        Err(Error::RevisionOnAdd(co.id()))
    );
    assert_eq!(host.obligation_count(), 0);
}

#[tokio::test]
#[cfg_attr(debug_assertions, should_panic(expected = "invariant violation"))]
async fn test_revise_unknown_obligation() {
    let (host, _, _, _) = new_mock_host(test_settings());
    let id = FileContractId::from_byte_array([3; 32]);
    assert_eq!(
        host.revise_obligation(new_revision_transaction(id, 1, 1, 1))
            .await,
        Err(Error::UnknownObligation(id))
    );
}

#[tokio::test]
#[cfg_attr(debug_assertions, should_panic(expected = "invariant violation"))]
async fn test_revise_with_two_revisions() {
    let (host, _, files, _) = new_mock_host(test_settings());
    let co = add_new_obligation(&host, &files, 1000, 50, 100, 110)
        .await
        .unwrap();
    let mut txn = new_revision_transaction(co.id(), 1, 1, 1);
    txn.file_contract_revisions
        .push(txn.file_contract_revisions[0].clone());

    assert_eq!(
        host.revise_obligation(txn).await,
        Err(Error::MalformedRevision(2))
    );
    assert_eq!(host.obligation(&co.id()), Some(co));
}

#[tokio::test]
#[cfg_attr(debug_assertions, should_panic(expected = "invariant violation"))]
async fn test_add_malformed_obligation() {
    let (host, _, _, persister) = new_mock_host(test_settings());
    let mut value = serde_json::to_value(new_obligation(1000, 50, 100, 110)).unwrap();
    value["origin_transaction"]["file_contracts"] = serde_json::json!([]);
    let co: ContractObligation = serde_json::from_value(value).unwrap();

    assert_eq!(
        host.add_obligation(co).await,
        Err(Error::MalformedOrigin(0))
    );
    assert_eq!(host.obligation_count(), 0);
    assert_eq!(host.ledger().anticipated_revenue, Currency::ZERO);
    assert_eq!(persister.save_count(), 0);
}
