//! Integration-Tests fuer den Signaling-Relay (echter Server, echte WebSockets)

use futures_util::{SinkExt, StreamExt};
use ruflink_observability::RelayMetriken;
use ruflink_signaling::{SignalingConfig, SignalingServer, SignalingState};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WARTEZEIT: Duration = Duration::from_secs(5);
const STILLE: Duration = Duration::from_millis(200);

struct TestServer {
    addr: SocketAddr,
    state: Arc<SignalingState>,
    shutdown_tx: watch::Sender<bool>,
}

async fn server_starten(config: SignalingConfig) -> TestServer {
    let state = SignalingState::neu(
        config,
        RelayMetriken::neu().expect("Metriken konnten nicht erstellt werden"),
    );
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Port konnte nicht gebunden werden");
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = SignalingServer::neu(Arc::clone(&state), addr);
    tokio::spawn(server.mit_listener_starten(listener, shutdown_rx));

    TestServer {
        addr,
        state,
        shutdown_tx,
    }
}

async fn verbinden(server: &TestServer) -> (Client, String) {
    let url = format!("ws://{}/ws", server.addr);
    let (mut client, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("WebSocket-Verbindung fehlgeschlagen");

    let me = naechste(&mut client).await;
    assert_eq!(me["type"], "me");
    let id = me["payload"]["clientId"]
        .as_str()
        .expect("me ohne clientId")
        .to_string();
    (client, id)
}

/// Liest die naechste JSON-Nachricht, Ping/Pong wird uebersprungen
async fn naechste(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(WARTEZEIT, client.next())
            .await
            .expect("Keine Nachricht innerhalb der Wartezeit")
            .expect("Verbindung geschlossen")
            .expect("Lesefehler");
        match frame {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            anderes => panic!("unerwarteter Frame: {anderes:?}"),
        }
    }
}

/// Stellt sicher, dass in kurzer Zeit keine Textnachricht ankommt
async fn keine_nachricht(client: &mut Client) {
    if let Ok(Some(Ok(Message::Text(text)))) = tokio::time::timeout(STILLE, client.next()).await {
        panic!("unerwartete Nachricht: {text}");
    }
}

async fn senden(client: &mut Client, nachricht: Value) {
    client
        .send(Message::Text(nachricht.to_string()))
        .await
        .expect("Senden fehlgeschlagen");
}

async fn warten_bis_registriert(server: &TestServer, anzahl: usize) {
    tokio::time::timeout(WARTEZEIT, async {
        while server.state.registry.anzahl() != anzahl {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Registry erreicht erwartete Groesse nicht");
}

// ---------------------------------------------------------------------------
// Szenarien
// ---------------------------------------------------------------------------

#[tokio::test]
async fn jeder_client_bekommt_eigene_id() {
    let server = server_starten(SignalingConfig::default()).await;

    let (_c1, id1) = verbinden(&server).await;
    let (_c2, id2) = verbinden(&server).await;

    assert_ne!(id1, id2);
    assert_eq!(server.state.registry.anzahl(), 2);
}

#[tokio::test]
async fn anruf_wird_weitergeleitet_und_trennung_gemeldet() {
    let server = server_starten(SignalingConfig::default()).await;

    let (mut c1, id1) = verbinden(&server).await;
    let (mut c2, id2) = verbinden(&server).await;

    senden(
        &mut c1,
        json!({
            "type": "call-request",
            "payload": {
                "targetClientId": id2,
                "signalPayload": "sdp-offer-X",
                "displayName": "Alice"
            }
        }),
    )
    .await;

    let eingehend = naechste(&mut c2).await;
    assert_eq!(
        eingehend,
        json!({
            "type": "call-incoming",
            "payload": {
                "signalPayload": "sdp-offer-X",
                "fromClientId": id1,
                "displayName": "Alice"
            }
        })
    );

    c1.close(None).await.unwrap();

    let beendet = naechste(&mut c2).await;
    assert_eq!(beendet, json!({ "type": "call-ended" }));
    warten_bis_registriert(&server, 1).await;
}

#[tokio::test]
async fn annahme_geht_an_den_anrufer_zurueck() {
    let server = server_starten(SignalingConfig::default()).await;

    let (mut c1, id1) = verbinden(&server).await;
    let (mut c2, id2) = verbinden(&server).await;

    let offer = json!({ "type": "offer", "sdp": "v=0\r\no=- 1 2 IN IP4 0.0.0.0\r\n" });
    senden(
        &mut c1,
        json!({
            "type": "call-request",
            "payload": { "targetClientId": id2, "signalPayload": offer, "displayName": "Alice" }
        }),
    )
    .await;
    let eingehend = naechste(&mut c2).await;
    assert_eq!(eingehend["payload"]["signalPayload"], offer);

    let answer = json!({ "type": "answer", "sdp": "v=0\r\n" });
    senden(
        &mut c2,
        json!({
            "type": "answer-call",
            "payload": { "toClientId": id1, "signalPayload": answer }
        }),
    )
    .await;

    let angenommen = naechste(&mut c1).await;
    assert_eq!(angenommen["type"], "call-accepted");
    assert_eq!(angenommen["payload"]["signalPayload"], answer);
    assert_eq!(angenommen["payload"]["fromClientId"], id2);
}

#[tokio::test]
async fn trennung_bei_drei_clients() {
    let server = server_starten(SignalingConfig::default()).await;

    let (c1, _) = verbinden(&server).await;
    let (mut c2, _) = verbinden(&server).await;
    let (mut c3, _) = verbinden(&server).await;

    drop(c1);

    assert_eq!(naechste(&mut c2).await["type"], "call-ended");
    assert_eq!(naechste(&mut c3).await["type"], "call-ended");

    // Genau einmal
    keine_nachricht(&mut c2).await;
    keine_nachricht(&mut c3).await;
    warten_bis_registriert(&server, 2).await;
}

#[tokio::test]
async fn anruf_an_unbekannte_id_meldet_unerreichbar() {
    let server = server_starten(SignalingConfig::default()).await;
    let (mut c1, _) = verbinden(&server).await;

    let fremd = "6f1c1f2e-4f0b-4d38-9a1e-2b8a4c1d9e77";
    senden(
        &mut c1,
        json!({
            "type": "call-request",
            "payload": { "targetClientId": fremd, "signalPayload": "x", "displayName": "A" }
        }),
    )
    .await;

    let antwort = naechste(&mut c1).await;
    assert_eq!(
        antwort,
        json!({ "type": "target-unreachable", "payload": { "targetClientId": fremd } })
    );
}

#[tokio::test]
async fn anruf_an_unbekannte_id_ohne_meldung() {
    let config = SignalingConfig {
        unerreichbar_melden: false,
        ..Default::default()
    };
    let server = server_starten(config).await;
    let (mut c1, _) = verbinden(&server).await;

    senden(
        &mut c1,
        json!({
            "type": "call-request",
            "payload": {
                "targetClientId": "6f1c1f2e-4f0b-4d38-9a1e-2b8a4c1d9e77",
                "signalPayload": "x",
                "displayName": "A"
            }
        }),
    )
    .await;

    keine_nachricht(&mut c1).await;
}

#[tokio::test]
async fn unbekannte_und_kaputte_nachrichten_werden_ignoriert() {
    let server = server_starten(SignalingConfig::default()).await;
    let (mut c1, id1) = verbinden(&server).await;
    let (mut c2, id2) = verbinden(&server).await;

    senden(&mut c1, json!({ "type": "calluser", "payload": {} })).await;
    c1.send(Message::Text("kein json".into())).await.unwrap();
    senden(
        &mut c1,
        json!({ "type": "call-request", "payload": { "targetClientId": "keine-uuid" } }),
    )
    .await;

    keine_nachricht(&mut c2).await;

    // Verbindung lebt weiter
    senden(
        &mut c1,
        json!({
            "type": "call-request",
            "payload": { "targetClientId": id2, "signalPayload": "ok", "displayName": "" }
        }),
    )
    .await;
    let eingehend = naechste(&mut c2).await;
    assert_eq!(eingehend["payload"]["fromClientId"], id1);
}

#[tokio::test]
async fn auflegen_ohne_trennung() {
    let server = server_starten(SignalingConfig::default()).await;
    let (mut c1, _) = verbinden(&server).await;
    let (mut c2, _) = verbinden(&server).await;

    senden(&mut c1, json!({ "type": "call-end" })).await;

    assert_eq!(naechste(&mut c2).await, json!({ "type": "call-ended" }));
    keine_nachricht(&mut c1).await;

    // Browser-Clients schicken oft ein leeres Payload mit
    senden(&mut c2, json!({ "type": "call-end", "payload": {} })).await;
    assert_eq!(naechste(&mut c1).await, json!({ "type": "call-ended" }));
    keine_nachricht(&mut c2).await;
    assert_eq!(server.state.registry.anzahl(), 2);
}

#[tokio::test]
async fn client_limit_lehnt_weitere_verbindungen_ab() {
    let config = SignalingConfig {
        max_clients: 1,
        ..Default::default()
    };
    let server = server_starten(config).await;
    let (_c1, _) = verbinden(&server).await;

    let url = format!("ws://{}/ws", server.addr);
    let ergebnis = tokio_tungstenite::connect_async(url).await;
    assert!(ergebnis.is_err());
}

#[tokio::test]
async fn shutdown_schliesst_verbindungen() {
    let server = server_starten(SignalingConfig::default()).await;
    let (mut c1, _) = verbinden(&server).await;

    server.shutdown_tx.send(true).unwrap();

    let ende = tokio::time::timeout(WARTEZEIT, async {
        loop {
            match c1.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(ende.is_ok(), "Verbindung wurde nicht geschlossen");
    warten_bis_registriert(&server, 0).await;

    tokio::time::timeout(WARTEZEIT, async {
        while server.state.health.nimmt_an() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Health meldet weiterhin Annahme");
    assert!(!server.state.nimmt_clients_an());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn client_limit_haelt_bei_parallelen_verbindungen() {
    let config = SignalingConfig {
        max_clients: 1,
        ..Default::default()
    };
    let server = server_starten(config).await;
    let url = format!("ws://{}/ws", server.addr);

    let mut versuche = Vec::new();
    for _ in 0..64 {
        let url = url.clone();
        versuche.push(tokio::spawn(async move {
            let Ok((mut client, _)) = tokio_tungstenite::connect_async(url).await else {
                return None;
            };
            match tokio::time::timeout(WARTEZEIT, client.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => {
                    let me: Value = serde_json::from_str(&text).unwrap();
                    assert_eq!(me["type"], "me");
                    Some(client)
                }
                _ => None,
            }
        }));
    }

    let mut angenommen = Vec::new();
    for versuch in versuche {
        if let Some(client) = versuch.await.unwrap() {
            angenommen.push(client);
        }
    }

    assert_eq!(angenommen.len(), 1, "genau ein Client darf durchkommen");
    assert_eq!(server.state.registry.anzahl(), 1);
    assert_eq!(server.state.metriken.connected_clients.get(), 1);
}

#[tokio::test]
async fn stummer_client_wird_nach_timeout_getrennt() {
    let config = SignalingConfig {
        keepalive_sek: 1,
        verbindungs_timeout_sek: 2,
        ..Default::default()
    };
    let server = server_starten(config).await;

    // Liest nicht mehr und beantwortet damit auch keine Pings
    let (mut stumm, _) = verbinden(&server).await;
    let (aktiv, _) = verbinden(&server).await;
    let (mut aktiv_tx, mut aktiv_rx) = aktiv.split();

    let beendet = tokio::time::timeout(WARTEZEIT, async {
        let mut takt = tokio::time::interval(Duration::from_millis(300));
        loop {
            tokio::select! {
                _ = takt.tick() => {
                    // Unbekannter Typ: wird ignoriert, haelt die Verbindung aber frisch
                    aktiv_tx
                        .send(Message::Text(json!({ "type": "lebenszeichen" }).to_string()))
                        .await
                        .unwrap();
                }
                frame = aktiv_rx.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        return serde_json::from_str::<Value>(&text).unwrap();
                    }
                    Some(Ok(_)) => continue,
                    anderes => panic!("aktive Verbindung unerwartet beendet: {anderes:?}"),
                }
            }
        }
    })
    .await
    .expect("call-ended nach Timeout erwartet");

    assert_eq!(beendet, json!({ "type": "call-ended" }));
    warten_bis_registriert(&server, 1).await;
    assert_eq!(server.state.metriken.connected_clients.get(), 1);

    // Der stumme Client hat vor dem Schliessen mindestens einen Ping bekommen
    let mut ping_gesehen = false;
    let _ = tokio::time::timeout(WARTEZEIT, async {
        loop {
            match stumm.next().await {
                Some(Ok(Message::Ping(_))) => ping_gesehen = true,
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(ping_gesehen, "Server muss Keepalive-Pings senden");
}
