use async_trait::async_trait;
use ethabi::Token;
use ethers::types::{Address, Bytes, TransactionReceipt, H256};
use ethers::utils::keccak256;
use smart_contract_deployer::{
    chain::{SendError, TransactionSender},
    settings::{ChainSettings, Settings},
    store::DeploymentStore,
    tokenscript::{PublishError, TokenScriptPublisher},
    types::{DeployRequest, DeploymentRecord, DeploymentStage, VerificationStatus},
    DeployError, DeploymentEvent, DeploymentExecutor,
};
use std::{
    num::NonZeroU32,
    sync::{Arc, Mutex},
    time::Duration,
};
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

const SOURCE: &str = r#"
// SPDX-License-Identifier: MIT
pragma solidity ^0.8.25;

contract MyToken {
    string public name;
    string public symbol;

    constructor(string memory name_, string memory symbol_) {
        name = name_;
        symbol = symbol_;
    }
}
"#;

const BYTECODE: &str = "0x6080604052600a600c565b005b";

#[derive(Debug)]
struct SentTx {
    to: Option<Address>,
    data: Vec<u8>,
}

struct MockSender {
    chain_id: u64,
    deploy_hash: H256,
    contract_address: Option<Address>,
    confirm: bool,
    sent: Mutex<Vec<SentTx>>,
}

impl MockSender {
    fn confirming(chain_id: u64, deploy_hash: H256, contract_address: Address) -> Self {
        Self {
            chain_id,
            deploy_hash,
            contract_address: Some(contract_address),
            confirm: true,
            sent: Mutex::new(vec![]),
        }
    }

    fn never_confirming(chain_id: u64, deploy_hash: H256) -> Self {
        Self {
            chain_id,
            deploy_hash,
            contract_address: None,
            confirm: false,
            sent: Mutex::new(vec![]),
        }
    }

    fn sent(&self) -> Vec<SentTx> {
        std::mem::take(&mut self.sent.lock().unwrap())
    }
}

#[async_trait]
impl TransactionSender for MockSender {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn send_deployment(&self, data: Bytes) -> Result<H256, SendError> {
        self.sent.lock().unwrap().push(SentTx {
            to: None,
            data: data.to_vec(),
        });
        Ok(self.deploy_hash)
    }

    async fn send_call(&self, to: Address, data: Bytes) -> Result<H256, SendError> {
        self.sent.lock().unwrap().push(SentTx {
            to: Some(to),
            data: data.to_vec(),
        });
        Ok(H256::repeat_byte(0xcc))
    }

    async fn await_receipt(
        &self,
        tx_hash: H256,
        _patience: Duration,
    ) -> Result<TransactionReceipt, SendError> {
        if !self.confirm {
            return Err(SendError::ConfirmationTimeout(tx_hash));
        }
        Ok(TransactionReceipt {
            transaction_hash: tx_hash,
            contract_address: self.contract_address,
            ..Default::default()
        })
    }
}

fn test_settings(server: &MockServer) -> Settings {
    let mut settings = Settings::default();
    settings.default_chain_id = 31337;
    settings.compiler.url = format!("{}/api/compile-contract", server.uri())
        .parse()
        .unwrap();
    settings.ipfs.api_url = format!("{}/pinning/pinFileToIPFS", server.uri())
        .parse()
        .unwrap();
    settings.verification.interval = 1;
    settings.verification.max_attempts = NonZeroU32::new(5);
    settings.confirmation.patience = 5;
    settings.chains.insert(
        "31337".to_string(),
        ChainSettings {
            name: "Testnet".to_string(),
            rpc_url: "http://localhost:8545".parse().unwrap(),
            explorer_url: "http://explorer.test".parse().unwrap(),
            api_url: format!("{}/api", server.uri()).parse().unwrap(),
            api_key: String::new(),
        },
    );
    settings
}

async fn mount_compiler(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/compile-contract"))
        .and(body_string_contains("MyToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "abi": [{
                "inputs": [
                    { "internalType": "string", "name": "name_", "type": "string" },
                    { "internalType": "string", "name": "symbol_", "type": "string" }
                ],
                "stateMutability": "nonpayable",
                "type": "constructor"
            }],
            "bytecode": BYTECODE
        })))
        .mount(server)
        .await;
}

async fn mount_ipfs(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/pinning/pinFileToIPFS"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "IpfsHash": "bafybeictest"
        })))
        .mount(server)
        .await;
}

async fn mount_verifier(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "0",
            "message": "NOTOK",
            "result": "Pending in queue"
        })))
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "1",
            "message": "OK",
            "result": format!("0x{}", "ef".repeat(32))
        })))
        .mount(server)
        .await;
}

fn deploy_request() -> DeployRequest {
    DeployRequest {
        chain_id: None,
        contract_name: "MyToken".to_string(),
        source_code: SOURCE.to_string(),
        constructor_args: vec!["MyToken".to_string(), "MTK".to_string()],
    }
}

#[tokio::test]
async fn deploys_confirms_and_verifies_end_to_end() {
    let server = MockServer::start().await;
    mount_compiler(&server).await;
    mount_ipfs(&server).await;
    mount_verifier(&server).await;

    let deploy_hash = H256::repeat_byte(0xaa);
    let deployed_address = Address::repeat_byte(0xbb);
    let sender = Arc::new(MockSender::confirming(31337, deploy_hash, deployed_address));
    let store = Arc::new(DeploymentStore::new());
    let mut events = store.subscribe();

    let executor = DeploymentExecutor::new(
        Arc::new(test_settings(&server)),
        sender.clone(),
        store.clone(),
    )
    .unwrap();

    let record = executor.deploy(deploy_request()).await.unwrap();

    assert_eq!(record.transaction_hash, deploy_hash);
    assert_eq!(record.address, Some(deployed_address));
    assert_eq!(
        record.explorer_url,
        format!("http://explorer.test/tx/{deploy_hash:?}")
    );
    assert_eq!(record.artifact_uri.as_deref(), Some("ipfs://bafybeictest"));
    assert_eq!(record.verification_status, VerificationStatus::Pending);
    assert_eq!(store.stage(), DeploymentStage::Confirmed);

    // Deploy data is the creation bytecode followed by the encoded
    // constructor arguments.
    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, None);
    let mut expected = hex::decode(BYTECODE.trim_start_matches("0x")).unwrap();
    expected.extend(ethabi::encode(&[
        Token::String("MyToken".to_string()),
        Token::String("MTK".to_string()),
    ]));
    assert_eq!(sent[0].data, expected);

    // Confirmation is observed before verification succeeds.
    let mut saw_confirmation = false;
    let deadline = Duration::from_secs(15);
    loop {
        let event = tokio::time::timeout(deadline, events.recv())
            .await
            .expect("expected verification to succeed")
            .unwrap();
        match event {
            DeploymentEvent::ConfirmationReceived {
                transaction_hash, ..
            } => {
                assert_eq!(transaction_hash, deploy_hash);
                saw_confirmation = true;
            }
            DeploymentEvent::VerificationSucceeded { transaction_hash } => {
                assert_eq!(transaction_hash, deploy_hash);
                assert!(saw_confirmation);
                break;
            }
            _ => {}
        }
    }

    assert_eq!(
        store.record().unwrap().verification_status,
        VerificationStatus::Success
    );
}

#[tokio::test]
async fn unconfirmed_deployment_is_still_recorded() {
    let server = MockServer::start().await;
    mount_compiler(&server).await;
    mount_ipfs(&server).await;
    // The verifier is never consulted with a hash: without an address
    // every attempt is a retry until the cap marks the record failed.
    Mock::given(method("POST"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "result": "Pending in queue"
        })))
        .expect(0)
        .mount(&server)
        .await;

    let deploy_hash = H256::repeat_byte(0xaa);
    let sender = Arc::new(MockSender::never_confirming(31337, deploy_hash));
    let store = Arc::new(DeploymentStore::new());

    let mut settings = test_settings(&server);
    settings.verification.max_attempts = NonZeroU32::new(1);
    let executor =
        DeploymentExecutor::new(Arc::new(settings), sender.clone(), store.clone()).unwrap();

    let record = executor.deploy(deploy_request()).await.unwrap();

    assert_eq!(record.address, None);
    assert_eq!(record.transaction_hash, deploy_hash);
    assert_eq!(store.stage(), DeploymentStage::ConfirmationFailed);

    // The attempt cap turns the pending record into a failed one.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if store.record().unwrap().verification_status == VerificationStatus::Failed {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "expected verification to give up"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn compilation_failure_aborts_and_resets_the_stage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/compile-contract"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "ParserError: Expected ';' but got '}'"
        })))
        .mount(&server)
        .await;

    let sender = Arc::new(MockSender::confirming(
        31337,
        H256::repeat_byte(0xaa),
        Address::repeat_byte(0xbb),
    ));
    let store = Arc::new(DeploymentStore::new());
    let executor = DeploymentExecutor::new(
        Arc::new(test_settings(&server)),
        sender.clone(),
        store.clone(),
    )
    .unwrap();

    let err = executor.deploy(deploy_request()).await.unwrap_err();
    match err {
        DeployError::Compilation(inner) => {
            assert!(inner.to_string().contains("ParserError"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(store.stage(), DeploymentStage::Idle);
    assert_eq!(store.record(), None);
    assert!(sender.sent().is_empty());
}

#[tokio::test]
async fn bad_constructor_value_fails_before_signing() {
    let server = MockServer::start().await;
    mount_compiler(&server).await;

    let sender = Arc::new(MockSender::confirming(
        31337,
        H256::repeat_byte(0xaa),
        Address::repeat_byte(0xbb),
    ));
    let store = Arc::new(DeploymentStore::new());
    let executor = DeploymentExecutor::new(
        Arc::new(test_settings(&server)),
        sender.clone(),
        store.clone(),
    )
    .unwrap();

    let mut request = deploy_request();
    request.constructor_args = vec!["MyToken".to_string()];

    let err = executor.deploy(request).await.unwrap_err();
    assert!(matches!(err, DeployError::ArgumentEncoding(_)));
    assert_eq!(store.stage(), DeploymentStage::Idle);
    assert!(sender.sent().is_empty());
}

#[tokio::test]
async fn tokenscript_publishes_and_returns_the_viewer_url() {
    let server = MockServer::start().await;
    mount_ipfs(&server).await;

    let deploy_hash = H256::repeat_byte(0xaa);
    let deployed_address = Address::repeat_byte(0xbb);
    let sender = Arc::new(MockSender::confirming(31337, deploy_hash, deployed_address));
    let store = Arc::new(DeploymentStore::new());
    store.publish_record(DeploymentRecord {
        address: Some(deployed_address),
        transaction_hash: deploy_hash,
        explorer_url: format!("http://explorer.test/tx/{deploy_hash:?}"),
        artifact_uri: None,
        verification_status: VerificationStatus::Pending,
        standard_json_input: "{}".to_string(),
        abi: serde_json::json!([]),
        source_code: SOURCE.to_string(),
    });

    let publisher = TokenScriptPublisher::new(
        &test_settings(&server),
        sender.clone(),
        store.clone(),
    )
    .unwrap();

    let viewer_url = publisher
        .publish("<ts:token xmlns:ts=\"http://tokenscript.org/2022/09/tokenscript\"/>")
        .await
        .unwrap();

    assert_eq!(
        viewer_url,
        format!(
            "https://viewer-staging.tokenscript.org/?chain=31337&contract={deployed_address:?}"
        )
    );
    assert_eq!(store.tokenscript_viewer_url(), Some(viewer_url));

    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, Some(deployed_address));
    assert_eq!(&sent[0].data[..4], &keccak256(b"setScriptURI(string[])")[..4]);
}

#[tokio::test]
async fn tokenscript_without_a_deployment_is_rejected_up_front() {
    let server = MockServer::start().await;
    // No pin, no transaction: the precondition fails first.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let sender = Arc::new(MockSender::confirming(
        31337,
        H256::repeat_byte(0xaa),
        Address::repeat_byte(0xbb),
    ));
    let store = Arc::new(DeploymentStore::new());
    let publisher = TokenScriptPublisher::new(
        &test_settings(&server),
        sender.clone(),
        store.clone(),
    )
    .unwrap();

    let err = publisher.publish("<ts/>").await.unwrap_err();
    assert!(matches!(err, PublishError::NoActiveDeployment));
    assert!(sender.sent().is_empty());
}
