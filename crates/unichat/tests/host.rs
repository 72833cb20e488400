mod common;

use std::sync::Arc;

use common::settle;
use unichat::session::TransportFrame;
use unichat::sinks::{HealthBoard, WireForwarder, WireMessage};
use unichat::{
    BufferSink, PresentationBuffer, Renderer, ScraperRegistry, SessionState, UniChatConfig,
    UniChatHost,
};

const ROOMSTATE: &str = "@emote-only=0;room-id=12345;slow=0 :tmi.twitch.tv ROOMSTATE #channel";

fn privmsg(id: &str, user_id: &str, name: &str, text: &str) -> String {
    format!(
        "@badges=;color=#00FF00;display-name={name};emotes=;id={id};room-id=12345;tmi-sent-ts=1700000000000;user-id={user_id} :{lower}!{lower}@{lower}.tmi.twitch.tv PRIVMSG #channel :{text}",
        lower = name.to_lowercase()
    )
}

#[tokio::test(start_paused = true)]
async fn host_fans_twitch_frames_out_to_every_sink() {
    let config = UniChatConfig::default();
    let host = UniChatHost::new(config.clone(), ScraperRegistry::with_defaults());

    let (forwarder, mut wire) = WireForwarder::new();
    let buffer = Arc::new(BufferSink::new(
        Renderer::from_config(&config.render),
        PresentationBuffer::from_config(&config.buffer),
    ));
    let health = Arc::new(HealthBoard::from_config(&config.dashboard));
    host.bus().subscribe(Arc::new(forwarder));
    host.bus().subscribe(buffer.clone());
    host.bus().subscribe(health.clone());

    let io = host
        .attach("twitch-chat", "https://www.twitch.tv/channel")
        .unwrap();
    let frames = [
        ROOMSTATE.to_string(),
        format!(
            "{}\r\n{}",
            privmsg("m1", "1", "Alice", "hello <there>"),
            privmsg("m2", "2", "Bob", "hi")
        ),
        privmsg("m3", "1", "Alice", "again"),
        "@room-id=12345;target-user-id=1;tmi-sent-ts=1700000000001 :tmi.twitch.tv CLEARCHAT #channel :alice".to_string(),
    ];
    for frame in frames {
        io.frames.send(TransportFrame::Text(frame)).await.unwrap();
    }
    settle().await;

    assert_eq!(host.state("twitch-chat"), Some(SessionState::Working));
    assert_eq!(
        health.health("twitch-chat").unwrap().state,
        SessionState::Working
    );

    let entries = buffer.snapshot();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message_id, "m2");
    assert!(entries[0].html.contains("data-from=\"2\""));
    assert!(entries[0].html.contains("Bob"));

    let mut types = Vec::new();
    while let Ok(message) = wire.try_recv() {
        let value: serde_json::Value = serde_json::from_str(message.as_str()).unwrap();
        let kind = value["type"].as_str().unwrap().to_string();
        match message {
            WireMessage::Event(_) => types.push(kind),
            WireMessage::Status(_) => types.push(format!("status:{kind}")),
        }
    }
    assert_eq!(
        types,
        vec![
            "status:idle",
            "status:ready",
            "unichat:message",
            "status:ping",
            "unichat:message",
            "unichat:message",
            "unichat:remove_user",
        ]
    );

    host.shutdown().await;
    assert!(host.attached().is_empty());
}

#[tokio::test(start_paused = true)]
async fn message_html_is_escaped_in_buffer() {
    let config = UniChatConfig::default();
    let host = UniChatHost::new(config.clone(), ScraperRegistry::with_defaults());
    let buffer = Arc::new(BufferSink::new(
        Renderer::new("{author_display_name}: {message}"),
        PresentationBuffer::new(10, None),
    ));
    host.bus().subscribe(buffer.clone());

    let io = host.attach("twitch-chat", "https://twitch.tv/channel").unwrap();
    io.frames
        .send(TransportFrame::Text(ROOMSTATE.to_string()))
        .await
        .unwrap();
    io.frames
        .send(TransportFrame::Text(privmsg(
            "m1",
            "1",
            "Alice",
            "<script>alert(1)</script>",
        )))
        .await
        .unwrap();
    settle().await;

    assert_eq!(
        buffer.snapshot()[0].html,
        "Alice: &lt;script&gt;alert(1)&lt;/script&gt;"
    );
    host.shutdown().await;
}
