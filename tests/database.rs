use anyhow::Result;
use host_obligations::{
    host::{Host, Persister, Snapshot},
    ledger::Ledger,
    test_utils::{
        MemoryPersister, MockChain, MockFileStore, add_new_obligation, new_mock_host,
        new_revision_transaction, new_test_db, test_settings,
    },
    types::Currency,
};

#[tokio::test]
async fn test_load_without_saved_state() -> Result<()> {
    let (reader, _writer, _temp_dir) = new_test_db().await?;
    assert_eq!(reader.load_snapshot().await?, None);
    Ok(())
}

#[tokio::test]
async fn test_snapshot_round_trip() -> Result<()> {
    let (reader, writer, _temp_dir) = new_test_db().await?;
    let (host, chain, files, _) = new_mock_host(test_settings());
    let a = add_new_obligation(&host, &files, 1000, 50, 10, 20).await?;
    add_new_obligation(&host, &files, 2000, 30, 15, 25).await?;
    host.revise_obligation(new_revision_transaction(a.id(), 1, 1500, 70))
        .await?;
    chain.confirm(a.origin_transaction());
    host.process_block(2).await;

    let snapshot = host.snapshot();
    writer.save(&snapshot).await?;
    assert_eq!(reader.load_snapshot().await?, Some(snapshot));
    Ok(())
}

#[tokio::test]
async fn test_save_replaces_previous_state() -> Result<()> {
    let (reader, writer, _temp_dir) = new_test_db().await?;
    let (host, _, files, _) = new_mock_host(test_settings());
    let a = add_new_obligation(&host, &files, 1000, 50, 10, 20).await?;
    add_new_obligation(&host, &files, 2000, 30, 15, 25).await?;
    writer.save(&host.snapshot()).await?;

    host.remove_obligation(&a.id(), true).await?;
    let snapshot = host.snapshot();
    writer.save(&snapshot).await?;

    let loaded = reader.load_snapshot().await?.unwrap();
    assert_eq!(loaded.obligations.len(), 1);
    assert_eq!(loaded.ledger.revenue, Currency::new(50));
    assert_eq!(loaded, snapshot);
    Ok(())
}

#[tokio::test]
async fn test_large_currency_values_survive() -> Result<()> {
    let (reader, writer, _temp_dir) = new_test_db().await?;
    let snapshot = Snapshot {
        block_height: 42,
        ledger: Ledger {
            space_remaining: -5,
            anticipated_revenue: Currency::new(u128::MAX),
            revenue: Currency::new(10u128.pow(30)),
            lost_revenue: Currency::ZERO,
        },
        ..Default::default()
    };
    writer.save(&snapshot).await?;
    assert_eq!(reader.load_snapshot().await?, Some(snapshot));
    Ok(())
}

#[tokio::test]
async fn test_restore_reverifies_everything() -> Result<()> {
    let (reader, writer, _temp_dir) = new_test_db().await?;
    let (host, chain, files, _) = new_mock_host(test_settings());
    let co = add_new_obligation(&host, &files, 1000, 50, 10, 20).await?;
    chain.confirm(co.origin_transaction());
    host.process_block(2).await;
    assert!(host.obligation(&co.id()).unwrap().origin_confirmed);
    writer.save(&host.snapshot()).await?;

    let snapshot = reader.load_snapshot().await?.unwrap();
    let restored = Host::restore(
        MockChain::new(2),
        MockFileStore::default(),
        MemoryPersister::default(),
        test_settings(),
        snapshot,
    )?;

    assert_eq!(restored.block_height(), 2);
    assert_eq!(restored.ledger(), host.ledger());
    let obligation = restored.obligation(&co.id()).unwrap();
    assert!(!obligation.origin_confirmed);
    assert!(!obligation.proof_confirmed());
    assert_eq!(restored.action_items(), vec![(3, co.id()), (10, co.id())]);
    Ok(())
}
