//! Cross-crate integration tests exercising the full pipeline:
//! connect -> ensure approval -> send -> wait for receipt.
//!
//! The node is a wiremock JSON-RPC server reached through the real HTTP
//! transport; the wallet app is a task that answers deep links the way an
//! installed wallet would, by calling back into `WalletCore::handle_callback`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chain_eth::abi::{decode_hex, encode_hex, encode_uint256};
use chain_eth::units::MAX_UINT256;
use chain_eth::{erc20, Address, TransactionRequest, TxStatus, U256};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use wallet_connect::deeplink::{build_callback_uri, parse_request, WalletRequest};
use wallet_connect::{CallbackResponse, ConnectError, ConnectionState, DeepLinkLauncher, MemorySessionStore, WalletInfo};
use wallet_core::{CoreConfig, WalletCore, WalletError};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const CHAIN_ID: u64 = 31337;
const CALLBACK: &str = "pipeline://wallet/callback";

fn account() -> Address {
    Address::parse("0x70997970C51812dc3A010C7d01b50e0d17dc79C8").unwrap()
}

fn token() -> Address {
    Address::parse("0x5FbDB2315678afecb367f032d93F642f64180aa3").unwrap()
}

fn spender() -> Address {
    Address::parse("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512").unwrap()
}

// ─── Fake node ─────────────────────────────────────────────────────

/// Answers by method name. The allowance is zero until an `approve` has
/// been mined; only hashes in `mined` have receipts.
struct Node {
    allowance_reads: AtomicUsize,
    mined: Mutex<Vec<String>>,
    reverted: Mutex<Vec<String>>,
}

impl Node {
    fn new() -> Arc<Self> {
        Arc::new(Self { allowance_reads: AtomicUsize::new(0), mined: Mutex::new(Vec::new()), reverted: Mutex::new(Vec::new()) })
    }

    fn result(&self, method: &str, params: &Value) -> Value {
        match method {
            "eth_call" => {
                let data = decode_hex(params[0]["data"].as_str().unwrap()).unwrap();
                assert_eq!(data[..4], erc20::ALLOWANCE_SELECTOR, "only allowance reads expected");
                let allowance = if self.allowance_reads.fetch_add(1, Ordering::SeqCst) == 0 {
                    U256::ZERO
                } else {
                    MAX_UINT256
                };
                json!(encode_hex(&encode_uint256(allowance)))
            }
            "eth_estimateGas" => json!("0x5208"),
            "eth_getTransactionReceipt" => {
                let hash = params[0].as_str().unwrap().to_string();
                let status = if self.reverted.lock().contains(&hash) {
                    "0x0"
                } else if self.mined.lock().contains(&hash) {
                    "0x1"
                } else {
                    return Value::Null;
                };
                json!({
                    "transactionHash": hash,
                    "blockNumber": "0x2a",
                    "status": status,
                    "gasUsed": "0x5208",
                    "logs": [],
                })
            }
            other => panic!("unexpected rpc method {other}"),
        }
    }
}

struct NodeResponder(Arc<Node>);

impl Respond for NodeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        let method = body["method"].as_str().unwrap();
        let result = self.0.result(method, &body["params"]);
        ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": body["id"], "result": result}))
    }
}

// ─── Fake wallet app ───────────────────────────────────────────────

#[derive(Debug)]
struct Launcher {
    uris: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl DeepLinkLauncher for Launcher {
    async fn can_launch(&self, _uri: &str) -> bool {
        true
    }

    async fn launch(&self, uri: &str) -> bool {
        self.uris.send(uri.to_string()).is_ok()
    }
}

#[derive(Clone, Copy)]
enum Behaviour {
    Approve,
    RejectTransactions,
    RevertTransactions,
}

struct Wallet {
    requests: Arc<Mutex<Vec<WalletRequest>>>,
}

/// Spawns the wallet app. Every transaction it approves is "mined" on `node`
/// under a fresh hash.
fn spawn_wallet(
    core: Arc<WalletCore>,
    node: Arc<Node>,
    mut uris: mpsc::UnboundedReceiver<String>,
    behaviour: Behaviour,
) -> Wallet {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();
    let scheme = core.connection().wallet().scheme.clone();
    tokio::spawn(async move {
        let mut sent = 0u64;
        while let Some(uri) = uris.recv().await {
            let request = parse_request(&uri, &scheme).unwrap();
            seen.lock().push(request.clone());
            let Some(id) = request.id().map(str::to_string) else { continue };

            let response = match (request.action.as_str(), behaviour) {
                ("pair", _) => CallbackResponse::Approved {
                    result: json!({
                        "accounts": [account().to_string()],
                        "chainId": format!("0x{CHAIN_ID:x}"),
                        "sessionId": "session-1",
                    }),
                },
                ("transaction", Behaviour::RejectTransactions) => {
                    CallbackResponse::Rejected { reason: Some("user denied transaction".into()) }
                }
                ("transaction", behaviour) => {
                    sent += 1;
                    let hash = format!("0x{sent:064x}");
                    if matches!(behaviour, Behaviour::RevertTransactions) {
                        node.reverted.lock().push(hash.clone());
                    } else {
                        node.mined.lock().push(hash.clone());
                    }
                    CallbackResponse::Approved { result: json!(hash) }
                }
                _ => continue,
            };
            core.handle_callback(&build_callback_uri(CALLBACK, &id, &response));
        }
    });
    Wallet { requests }
}

impl Wallet {
    fn transactions(&self) -> Vec<Value> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.action == "transaction")
            .map(|r| r.payload["params"][0].clone())
            .collect()
    }

    fn actions(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.action.clone()).collect()
    }
}

async fn setup(behaviour: Behaviour) -> (Arc<WalletCore>, Wallet, MockServer) {
    let server = MockServer::start().await;
    let node = Node::new();
    Mock::given(wiremock::matchers::method("POST"))
        .respond_with(NodeResponder(node.clone()))
        .mount(&server)
        .await;

    let config = json!({
        "callbackUri": CALLBACK,
        "appName": "Pipeline",
        "receiptPollIntervalMs": 20,
        "receiptMaxWaitSecs": 2,
        "walletRequestTimeoutSecs": 5,
        "chains": [{
            "chainId": CHAIN_ID,
            "name": "Local",
            "rpcUrl": server.uri(),
            "nativeSymbol": "ETH",
            "isTestnet": true,
        }],
    });
    let config = CoreConfig::from_json(&config.to_string()).unwrap();

    let (tx, rx) = mpsc::unbounded_channel();
    let core = Arc::new(
        WalletCore::new(
            config,
            WalletInfo::metamask(),
            Arc::new(Launcher { uris: tx }),
            Arc::new(MemorySessionStore::new()),
        )
        .unwrap(),
    );
    let wallet = spawn_wallet(core.clone(), node, rx, behaviour);
    (core, wallet, server)
}

// ─── connect -> approve -> send -> receipt ─────────────────────────

#[tokio::test]
async fn approve_then_spend_pipeline() {
    let (core, wallet, _server) = setup(Behaviour::Approve).await;
    let mut events = core.connection().subscribe();

    // 1. Pair with the wallet
    let session = core.connect(CHAIN_ID).await.unwrap();
    assert_eq!(session.address, account());
    assert_eq!(session.chain_id, CHAIN_ID);
    assert_eq!(core.connection().state(), ConnectionState::Connected);
    assert_eq!(events.recv().await.unwrap().current, ConnectionState::Connecting);
    assert_eq!(events.recv().await.unwrap().current, ConnectionState::AwaitingApproval);
    assert_eq!(events.recv().await.unwrap().current, ConnectionState::Connected);

    // 2. Allowance is zero, so exactly one approve goes to the wallet
    let erc20 = core.erc20(CHAIN_ID, token()).unwrap();
    let amount = U256::from(1_000_000u64);
    let approve_hash = erc20.ensure_approval(&spender(), amount, false).await.unwrap().unwrap();

    let txs = wallet.transactions();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0]["to"], json!(token().to_string()));
    assert_eq!(txs[0]["from"], json!(account().to_string()));
    let data = decode_hex(txs[0]["data"].as_str().unwrap()).unwrap();
    assert_eq!(data, erc20::encode_approve(&spender(), amount));

    // 3. The caller orders "approve then spend" by awaiting the receipt
    let lifecycle = core.lifecycle(CHAIN_ID).unwrap();
    let receipt = lifecycle
        .wait_for_receipt(&approve_hash, Duration::from_millis(20), Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(receipt.status, TxStatus::Confirmed);
    assert_eq!(receipt.block_number, Some(42));

    // 4. Now the allowance covers it: no second approve
    assert_eq!(erc20.ensure_approval(&spender(), amount, false).await.unwrap(), None);
    assert_eq!(wallet.transactions().len(), 1);

    // 5. Native transfer with an estimated, buffered gas limit
    let receipt = lifecycle
        .send_and_wait(&TransactionRequest::native_transfer(spender(), U256::from(10u64).pow(U256::from(18u64))))
        .await
        .unwrap();
    assert_eq!(receipt.status, TxStatus::Confirmed);
    let txs = wallet.transactions();
    assert_eq!(txs[1]["gas"], json!("0x6270"));
    assert_eq!(txs[1]["chainId"], json!(format!("0x{CHAIN_ID:x}")));
    assert_eq!(txs[1]["value"], json!("0xde0b6b3a7640000"));

    // 6. Disconnect resets locally and notifies the wallet
    core.disconnect().await;
    assert_eq!(core.connection().state(), ConnectionState::Disconnected);
    assert!(matches!(
        erc20.approve(&spender(), amount).await,
        Err(WalletError::NotConnected)
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(wallet.actions().last().map(String::as_str), Some("disconnect"));
}

// ─── wallet-side outcomes ──────────────────────────────────────────

#[tokio::test]
async fn rejected_transaction_keeps_session() {
    let (core, wallet, _server) = setup(Behaviour::RejectTransactions).await;
    core.connect(CHAIN_ID).await.unwrap();

    let lifecycle = core.lifecycle(CHAIN_ID).unwrap();
    let err = lifecycle
        .send(&TransactionRequest::native_transfer(spender(), U256::from(1u64)))
        .await
        .unwrap_err();
    assert!(err.is_user_decision());
    assert!(matches!(err, WalletError::Connect(ConnectError::UserRejected { .. })));
    assert_eq!(core.connection().state(), ConnectionState::Connected);
    assert_eq!(wallet.transactions().len(), 1);
}

#[tokio::test]
async fn reverted_transaction_is_failed() {
    let (core, _wallet, _server) = setup(Behaviour::RevertTransactions).await;
    core.connect(CHAIN_ID).await.unwrap();

    let receipt = core
        .lifecycle(CHAIN_ID)
        .unwrap()
        .send_and_wait(&TransactionRequest::contract_call(token(), vec![0xde, 0xad]))
        .await
        .unwrap();
    assert_eq!(receipt.status, TxStatus::Failed);
}

#[tokio::test]
async fn unknown_hash_stays_pending() {
    let (core, _wallet, _server) = setup(Behaviour::Approve).await;
    let lifecycle = core.lifecycle(CHAIN_ID).unwrap();
    let receipt = lifecycle
        .wait_for_receipt("0x1234", Duration::from_millis(20), Duration::from_millis(200))
        .await
        .unwrap();
    assert_eq!(receipt.status, TxStatus::Pending);
    assert!(!receipt.is_final());
}
