//! Networked simulation tests
//!
//! The tokio authority driver from `tephra-server` on one turmoil host and a
//! replaying client on another, talking length-prefixed frames over
//! simulated TCP with latency.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tephra_client::{Client, ClientAction, ClientConfig};
use tephra_core::{FrameSink, FrameSource};
use tephra_harness::{SimEnv, SimSink, SimSource, SimTransport};
use tephra_proto::NodeId;
use tephra_server::{Authority, Handshake, ServerConfig, demo::Counter};

const BUTTON: NodeId = NodeId(2);
const LABEL: NodeId = NodeId(3);

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

fn label(client: &Client) -> Option<String> {
    let dom = client.dom(LABEL)?;
    client.document().text(dom).map(str::to_owned)
}

async fn flush(client: &mut Client, sink: &mut SimSink) -> turmoil::Result {
    for action in client.take_actions() {
        if let ClientAction::Send(frame) = action {
            sink.send_frame(frame).await?;
        }
    }
    Ok(())
}

async fn pump_until(
    client: &mut Client,
    sink: &mut SimSink,
    source: &mut SimSource,
    done: impl Fn(&Client) -> bool,
) -> turmoil::Result {
    while !done(client) {
        let frame = source.recv_frame().await?.ok_or("connection closed")?;
        client.on_frame(&frame, now())?;
        flush(client, sink).await?;
    }
    Ok(())
}

fn simulation(seed: u64) -> turmoil::Sim<'static> {
    let mut sim = turmoil::Builder::new()
        .simulation_duration(Duration::from_secs(60))
        .min_message_latency(Duration::from_millis(20))
        .max_message_latency(Duration::from_millis(80))
        .rng_seed(seed)
        .build();

    sim.host("authority", move || async move {
        let authority = Arc::new(Authority::new(SimEnv::with_seed(seed), ServerConfig::default()));
        tephra_harness::serve("0.0.0.0:8080", authority, Counter::new).await?;
        Ok(())
    });
    sim
}

#[test]
fn counter_survives_reconnect() -> turmoil::Result {
    let mut sim = simulation(7);

    sim.client("browser", async {
        let mut client = Client::new(ClientConfig::default(), "/");
        let fresh = Handshake { resume: None, location: "/".into() };
        let (mut sink, mut source) = SimTransport::connect("authority:8080", &fresh).await?;
        client.on_connected();
        pump_until(&mut client, &mut sink, &mut source, |c| label(c).is_some()).await?;
        assert_eq!(label(&client).as_deref(), Some("0"));

        client.click(BUTTON, now())?;
        flush(&mut client, &mut sink).await?;
        pump_until(&mut client, &mut sink, &mut source, |c| label(c).as_deref() == Some("1"))
            .await?;

        let token = client.token().ok_or("no token")?.to_owned();
        sink.close("navigating away").await?;
        client.on_disconnected();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let resume = Handshake { resume: Some(token.clone()), location: "/".into() };
        let (mut sink, mut source) = SimTransport::connect("authority:8080", &resume).await?;
        client.on_connected();
        pump_until(&mut client, &mut sink, &mut source, |c| label(c).is_some()).await?;
        assert_eq!(label(&client).as_deref(), Some("1"));
        assert_eq!(client.token(), Some(token.as_str()));
        Ok(())
    });

    sim.run()
}

#[test]
fn pong_latency_reflects_link_delay() -> turmoil::Result {
    let mut sim = simulation(11);

    sim.client("browser", async {
        let mut client = Client::new(ClientConfig::default(), "/slow");
        let handshake = Handshake { resume: None, location: "/slow".into() };
        let (mut sink, mut source) = SimTransport::connect("authority:8080", &handshake).await?;
        client.on_connected();
        pump_until(&mut client, &mut sink, &mut source, |c| c.latency() > Duration::ZERO).await?;

        // One round trip over a link delaying each segment by 20-80ms
        let latency = client.latency();
        assert!(latency >= Duration::from_millis(40), "latency {latency:?}");
        assert!(client.input_debounce() >= latency + Duration::from_millis(40));
        Ok(())
    });

    sim.run()
}
