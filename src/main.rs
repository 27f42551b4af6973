use std::sync::Arc;

use custody_vault::{
    envelope, hex_to_string, CustodyConfig, CustodyService, CustodyStore, Envelope,
    InMemorySaltDirectory, InMemoryStore, PassphraseShares, WalletMetadata,
};

fn preview(data: &str) -> String {
    if data.len() > 48 {
        format!("{}...{}", &data[..24], &data[data.len() - 8..])
    } else {
        data.to_string()
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("=== Layered Key Custody: Three-Tier Walkthrough ===\n");

    // --- Provisioning (done once, outside the running service) ---
    // The operation identity lives in the service environment; the backup
    // identity's private half goes to cold storage and only its public key
    // stays online.
    let operation_passphrase = "this_secret_seals_customer_keys_in_the_database";
    let backup_passphrase = "cold_storage_only_secret";
    let service_salt = "service_wide_secret_from_the_vault_environment";

    let operation = custody_vault::generate(
        "operation",
        "operation@vault.example",
        &PassphraseShares::single(operation_passphrase),
    )
    .expect("operation identity");
    let backup = custody_vault::generate(
        "backup",
        "backup@vault.example",
        &PassphraseShares::single(backup_passphrase),
    )
    .expect("backup identity");

    println!("[PROVISION] Operation key: {}", operation.public_key.fingerprint());
    println!("[PROVISION] Backup key:    {}\n", backup.public_key.fingerprint());

    let config = CustodyConfig::new(
        operation.public_key,
        operation.private_key.clone(),
        operation_passphrase.to_string(),
        backup.public_key,
        service_salt.to_string(),
    )
    .expect("config");

    // The per-customer salt lives in an external account store; the wrapped
    // blobs land in the vault database.
    let salts = Arc::new(InMemorySaltDirectory::new());
    salts.insert("user-1", "per_user_salt_from_the_external_account_store");
    let store = InMemoryStore::new();
    let service = CustodyService::new(config, Arc::clone(&salts));

    // --- Enrollment ---
    let enrollment = service
        .enroll_customer("user-1", "tommy", "tommy@vault.example", "123456")
        .expect("enrollment");
    let identity_record = enrollment.to_record().expect("identity record");

    println!("[ENROLL] Customer key:        {}", enrollment.public_key.fingerprint());
    println!(
        "[ENROLL] Wrapped private key: {}",
        preview(&identity_record.wrapped_private_key)
    );
    println!(
        "[ENROLL] Wrapped revocation:  {}\n",
        preview(&identity_record.wrapped_revocation)
    );

    store
        .save_identity_record(identity_record)
        .expect("save identity");

    // --- Wallet protection ---
    // The signing key and its address metadata come from the ledger-key
    // library; this demo uses stand-in values.
    let wallet_secret = b"ed25519-sk-demo";
    let metadata = WalletMetadata {
        public_key_hex: "bb".repeat(32),
        key_hash: "dd".repeat(28),
        address_mainnet: "addr1qxy...".to_string(),
        address_preprod: "addr_test1qpp...".to_string(),
        address_preview: "addr_test1qpv...".to_string(),
    };

    let protected = service
        .protect_wallet_secret("user-1", &enrollment.public_key, wallet_secret, metadata)
        .expect("protect wallet secret");
    let wallet_record = protected.to_record().expect("wallet record");

    println!(
        "[PROTECT] Wrapped wallet secret: {}",
        preview(&wallet_record.wrapped_secret)
    );
    println!(
        "[PROTECT] Recipients: customer {} + backup {}\n",
        enrollment.public_key.fingerprint(),
        backup.public_key.fingerprint()
    );

    store.save_wallet_record(wallet_record).expect("save wallet");

    // --- Recovery (customer path) ---
    // Everything below starts from what the database actually holds.
    let wrapped_key_hex = store
        .get_wrapped_private_key("user-1")
        .expect("fetch")
        .expect("identity record present");
    let wrapped_secret_hex = store
        .get_wrapped_secret("user-1")
        .expect("fetch")
        .expect("wallet record present");

    let wrapped_key =
        Envelope::from_json(&hex_to_string(&wrapped_key_hex).expect("hex")).expect("envelope");
    let wrapped_secret =
        Envelope::from_json(&hex_to_string(&wrapped_secret_hex).expect("hex")).expect("envelope");

    let recovered = service
        .recover_wallet_secret("user-1", &wrapped_key, &wrapped_secret, "123456")
        .expect("recovery");

    println!(
        "[RECOVER] Customer path: {}",
        String::from_utf8_lossy(&recovered)
    );
    assert_eq!(recovered.as_slice(), wallet_secret);

    // --- Recovery (backup path, cold storage) ---
    let via_backup = envelope::open(
        &wrapped_secret,
        &backup.private_key,
        &PassphraseShares::single(backup_passphrase),
    )
    .expect("backup recovery");
    println!(
        "[RECOVER] Backup path:   {}",
        String::from_utf8_lossy(&via_backup)
    );
    assert_eq!(via_backup.as_slice(), wallet_secret);

    // --- Revocation (operator flow) ---
    let token = service
        .recover_revocation_token(&enrollment.wrapped_revocation)
        .expect("revocation token");
    let matches = custody_vault::revocation_matches(&enrollment.revocation_digest, &token);
    println!("\n[REVOKE] Token digest matches stored record: {}", matches);

    println!("\n=== Custody Summary ===");
    println!("- Customer private key: sealed to the operation tier only");
    println!("- Wallet secret: sealed to customer + backup tiers");
    println!("- Customer passphrase: PIN + service secret + external salt");
    println!("- No single party can recover the wallet secret alone");
}
