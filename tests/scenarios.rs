use utxo_ledger::{ActorDirectory, Ledger, LedgerConfig, LedgerError};

fn ledger() -> Ledger {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = LedgerConfig::from_toml_str("difficulty = 2\nmining_reward = 30\n").unwrap();
    Ledger::with_config(config).unwrap()
}

fn base_scenario(ledger: &Ledger, directory: &mut ActorDirectory) {
    for name in ["kim", "junu", "emily"] {
        directory.create(name).unwrap();
    }

    let kim = directory.get("kim").unwrap();
    let junu = directory.get("junu").unwrap();
    let emily = directory.get("emily").unwrap();

    ledger.mine(kim.address()).unwrap();
    kim.send(ledger, junu.address(), 5).unwrap();
    kim.send(ledger, emily.address(), 10).unwrap();
    junu.send(ledger, emily.address(), 3).unwrap();
    ledger.mine(junu.address()).unwrap();
    junu.send(ledger, emily.address(), 20).unwrap();
    ledger.mine(emily.address()).unwrap();
}

#[test]
fn base_scenario_verifies() {
    let ledger = ledger();
    let mut directory = ActorDirectory::new();
    base_scenario(&ledger, &mut directory);

    assert_eq!(ledger.height(), 3);
    assert!(ledger.pending_transactions().is_empty());
    assert!(ledger.verify().is_ok());

    let kim = directory.get("kim").unwrap().address();
    let junu = directory.get("junu").unwrap().address();
    let emily = directory.get("emily").unwrap().address();
    assert_eq!(ledger.balance(kim), 15);
    assert_eq!(ledger.balance(junu), 12);
    assert_eq!(ledger.balance(emily), 63);

    // Block 1 holds the reward plus the three transfers and their change
    assert_eq!(ledger.block_transactions(1).unwrap().len(), 7);
    assert_eq!(directory.name_of(&ledger.chain()[0].miner), Some("emily"));
}

#[test]
fn overspending_actor_is_rejected() {
    let ledger = ledger();
    let mut directory = ActorDirectory::new();
    base_scenario(&ledger, &mut directory);

    let stefania = directory.create("stefania").unwrap().address().clone();
    let junu = directory.get("junu").unwrap();
    let before = ledger.unspent_transactions(junu.address());

    let err = junu.send(&ledger, &stefania, 20).unwrap_err();
    assert!(matches!(err, LedgerError::Overspend { attempted_balance: -8, .. }));
    assert_eq!(ledger.unspent_transactions(junu.address()).len(), before.len());
    assert!(ledger.pending_transactions().is_empty());
}

#[test]
fn attack_scenario_is_detected() {
    let ledger = ledger();
    let mut directory = ActorDirectory::new();
    base_scenario(&ledger, &mut directory);

    let target = ledger.block_transactions(1).unwrap()[2].clone();
    let before = ledger.hash_id(target.id).unwrap();

    ledger.with_transaction_mut(target.id, |tx| tx.amount = 4).unwrap();
    assert_ne!(ledger.hash_id(target.id).unwrap(), before);

    match ledger.verify() {
        Err(LedgerError::Integrity { block_index, .. }) => assert_eq!(block_index, 1),
        other => panic!("expected integrity error, got {:?}", other),
    }

    let emily = directory.get("emily").unwrap();
    assert!(ledger.mine(emily.address()).is_err());
}

#[test]
fn unfunded_actor_cannot_create_value() {
    let ledger = ledger();
    let mut directory = ActorDirectory::new();
    base_scenario(&ledger, &mut directory);

    let newcomer = directory.create("stefania").unwrap().clone();
    let emily = directory.get("emily").unwrap().address().clone();

    let err = newcomer.send(&ledger, &emily, 1000).unwrap_err();
    assert!(matches!(err, LedgerError::Overspend { attempted_balance: -1000, .. }));
    assert_eq!(ledger.balance(newcomer.address()), 0);
    assert!(ledger.pending_transactions().is_empty());

    ledger.mine(&emily).unwrap();
    assert!(ledger.verify().is_ok());

    let total: u128 = ["kim", "junu", "emily", "stefania"]
        .iter()
        .map(|name| ledger.balance(directory.get(name).unwrap().address()))
        .sum();
    let issued = ledger.height() as u128 * u128::from(ledger.config().mining_reward);
    assert_eq!(total, issued);
}
