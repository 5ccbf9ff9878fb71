pub mod acceptor;
pub mod auth;
pub mod config;
pub mod handler;
pub mod reaper;
pub mod registry;
pub mod session;
pub mod state;

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::{sleep, timeout};

    use causerie_shared::frame::{read_frame, write_frame, Frame, MessageType};
    use causerie_shared::FrameError;

    use crate::config::ServerConfig;
    use crate::state::Shared;
    use crate::{acceptor, reaper};

    async fn start_server(config: ServerConfig) -> SocketAddr {
        let state = Shared::new_shared(&config);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(reaper::run(
            state.clone(),
            config.reaper_period,
            config.idle_timeout,
        ));
        tokio::spawn(acceptor::run(listener, state));
        addr
    }

    async fn start_default_server() -> SocketAddr {
        start_server(ServerConfig::default()).await
    }

    async fn login(addr: SocketAddr, id: &str, password: &str) -> TcpStream {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        write_frame(&mut stream, &Frame::login(id, password))
            .await
            .unwrap();
        let reply = read_frame(&mut stream).await.unwrap();
        assert_eq!(reply.kind, MessageType::LoginAck);
        assert_eq!(reply.data, b"Login successful");
        stream
    }

    async fn send(stream: &mut TcpStream, frame: Frame) {
        write_frame(stream, &frame).await.unwrap();
    }

    async fn recv(stream: &mut TcpStream) -> Frame {
        timeout(Duration::from_secs(2), read_frame(stream))
            .await
            .expect("no frame within 2s")
            .unwrap()
    }

    #[tokio::test]
    async fn login_succeeds_with_known_credentials() {
        let addr = start_default_server().await;
        login(addr, "alice", "12345").await;
    }

    #[tokio::test]
    async fn login_with_bad_password_is_refused_and_closed() {
        let addr = start_default_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        send(&mut stream, Frame::login("alice", "wrong")).await;

        let reply = recv(&mut stream).await;
        assert_eq!(reply.kind, MessageType::LoginNak);
        assert_eq!(reply.data, b"Invalid username/password");
        assert!(matches!(
            read_frame(&mut stream).await,
            Err(FrameError::Closed)
        ));
    }

    #[tokio::test]
    async fn duplicate_id_is_refused_and_first_login_survives() {
        let addr = start_default_server().await;
        let mut first = login(addr, "alice", "12345").await;

        let mut second = TcpStream::connect(addr).await.unwrap();
        send(&mut second, Frame::login("alice", "12345")).await;
        let reply = recv(&mut second).await;
        assert_eq!(reply.kind, MessageType::LoginNak);
        assert_eq!(reply.data, b"Client ID already in use");

        send(&mut first, Frame::reply(MessageType::Query, Vec::new())).await;
        let roster = recv(&mut first).await;
        assert_eq!(roster.kind, MessageType::QueryAck);
        assert!(roster.data_text().contains("alice"));
    }

    #[tokio::test]
    async fn full_server_refuses_login() {
        let addr = start_server(ServerConfig {
            max_clients: 1,
            ..ServerConfig::default()
        })
        .await;
        let _jill = login(addr, "jill", "eW94dsol").await;

        let mut jack = TcpStream::connect(addr).await.unwrap();
        send(&mut jack, Frame::login("jack", "432wlFd")).await;
        let reply = recv(&mut jack).await;
        assert_eq!(reply.kind, MessageType::LoginNak);
        assert_eq!(reply.data, b"Server full");
    }

    #[tokio::test]
    async fn non_login_first_frame_closes_the_connection() {
        let addr = start_default_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        send(&mut stream, Frame::reply(MessageType::Query, Vec::new())).await;
        assert!(matches!(
            read_frame(&mut stream).await,
            Err(FrameError::Closed)
        ));
    }

    #[tokio::test]
    async fn create_join_and_broadcast_reach_all_members() {
        let addr = start_default_server().await;
        let mut alice = login(addr, "alice", "12345").await;
        let mut bob = login(addr, "bob", "qwerty").await;

        send(
            &mut alice,
            Frame::new(MessageType::NewSession, "", "", b"room1".to_vec()),
        )
        .await;
        let ack = recv(&mut alice).await;
        assert_eq!(ack.kind, MessageType::NewSessionAck);
        assert_eq!(ack.data, b"room1");

        send(&mut bob, Frame::new(MessageType::Join, "", "", b"room1".to_vec())).await;
        let ack = recv(&mut bob).await;
        assert_eq!(ack.kind, MessageType::JoinAck);
        assert_eq!(ack.data, b"room1");

        send(
            &mut alice,
            Frame::new(MessageType::Message, "spoofed", "room1", b"hi".to_vec()),
        )
        .await;

        // both members receive the broadcast, the sender included, and the
        // server stamps the authenticated source over whatever was sent
        for stream in [&mut alice, &mut bob] {
            let msg = recv(stream).await;
            assert_eq!(msg.kind, MessageType::Message);
            assert_eq!(msg.source, "alice");
            assert_eq!(msg.session, "room1");
            assert_eq!(msg.data, b"hi");
        }
    }

    #[tokio::test]
    async fn join_missing_session_is_nakked() {
        let addr = start_default_server().await;
        let mut alice = login(addr, "alice", "12345").await;
        send(&mut alice, Frame::new(MessageType::Join, "", "", b"ghost".to_vec())).await;
        let reply = recv(&mut alice).await;
        assert_eq!(reply.kind, MessageType::JoinNak);
        assert_eq!(reply.data, b"ghost: session not found");
    }

    #[tokio::test]
    async fn joining_twice_acks_twice_without_duplicate_membership() {
        let addr = start_default_server().await;
        let mut alice = login(addr, "alice", "12345").await;
        send(
            &mut alice,
            Frame::new(MessageType::NewSession, "", "", b"lab".to_vec()),
        )
        .await;
        assert_eq!(recv(&mut alice).await.kind, MessageType::NewSessionAck);

        for _ in 0..2 {
            send(&mut alice, Frame::new(MessageType::Join, "", "", b"lab".to_vec())).await;
            let reply = recv(&mut alice).await;
            assert_eq!(reply.kind, MessageType::JoinAck);
            assert_eq!(reply.data, b"lab");
        }

        send(&mut alice, Frame::reply(MessageType::Query, Vec::new())).await;
        let roster = recv(&mut alice).await;
        assert!(roster.data_text().contains("lab (1 members)"));
    }

    #[tokio::test]
    async fn messages_stay_inside_their_session() {
        let addr = start_default_server().await;
        let mut alice = login(addr, "alice", "12345").await;
        let mut bob = login(addr, "bob", "qwerty").await;

        for sid in ["r1", "r2"] {
            send(
                &mut alice,
                Frame::new(MessageType::NewSession, "", "", sid.as_bytes().to_vec()),
            )
            .await;
            assert_eq!(recv(&mut alice).await.kind, MessageType::NewSessionAck);
        }
        send(&mut bob, Frame::new(MessageType::Join, "", "", b"r1".to_vec())).await;
        assert_eq!(recv(&mut bob).await.kind, MessageType::JoinAck);

        send(
            &mut alice,
            Frame::new(MessageType::Message, "", "r2", b"secret".to_vec()),
        )
        .await;
        let echo = recv(&mut alice).await;
        assert_eq!((echo.session.as_str(), echo.data.as_slice()), ("r2", &b"secret"[..]));

        send(
            &mut bob,
            Frame::new(MessageType::Message, "", "r1", b"public".to_vec()),
        )
        .await;

        // bob's first incoming frame is his own r1 echo: the r2 message
        // never reached him
        let msg = recv(&mut bob).await;
        assert_eq!(msg.session, "r1");
        assert_eq!(msg.data, b"public");

        let msg = recv(&mut alice).await;
        assert_eq!((msg.session.as_str(), msg.data.as_slice()), ("r1", &b"public"[..]));
    }

    #[tokio::test]
    async fn leave_for_unjoined_session_produces_no_frame() {
        let addr = start_default_server().await;
        let mut alice = login(addr, "alice", "12345").await;
        send(
            &mut alice,
            Frame::new(MessageType::LeaveSession, "", "nowhere", Vec::new()),
        )
        .await;
        send(&mut alice, Frame::reply(MessageType::Query, Vec::new())).await;

        // the next frame is the query reply, so LEAVE produced nothing
        let reply = recv(&mut alice).await;
        assert_eq!(reply.kind, MessageType::QueryAck);
    }

    #[tokio::test]
    async fn leaving_last_member_destroys_the_session() {
        let addr = start_default_server().await;
        let mut alice = login(addr, "alice", "12345").await;
        send(
            &mut alice,
            Frame::new(MessageType::NewSession, "", "", b"solo".to_vec()),
        )
        .await;
        assert_eq!(recv(&mut alice).await.kind, MessageType::NewSessionAck);

        send(
            &mut alice,
            Frame::new(MessageType::LeaveSession, "", "solo", Vec::new()),
        )
        .await;
        send(&mut alice, Frame::reply(MessageType::Query, Vec::new())).await;
        let roster = recv(&mut alice).await;
        assert!(!roster.data_text().contains("solo"));
    }

    #[tokio::test]
    async fn exit_detaches_the_client_everywhere() {
        let addr = start_default_server().await;
        let mut alice = login(addr, "alice", "12345").await;
        let mut bob = login(addr, "bob", "qwerty").await;

        send(
            &mut alice,
            Frame::new(MessageType::NewSession, "", "", b"lab".to_vec()),
        )
        .await;
        assert_eq!(recv(&mut alice).await.kind, MessageType::NewSessionAck);
        send(&mut bob, Frame::new(MessageType::Join, "", "", b"lab".to_vec())).await;
        assert_eq!(recv(&mut bob).await.kind, MessageType::JoinAck);

        send(&mut alice, Frame::reply(MessageType::Exit, Vec::new())).await;
        sleep(Duration::from_millis(100)).await;

        send(&mut bob, Frame::reply(MessageType::Query, Vec::new())).await;
        let roster = recv(&mut bob).await;
        let text = roster.data_text().into_owned();
        assert!(!text.contains("alice"));
        assert!(text.contains("lab (1 members)"));

        // alice may log in again afterwards
        login(addr, "alice", "12345").await;
    }

    #[tokio::test]
    async fn idle_client_is_evicted_by_the_reaper() {
        let addr = start_server(ServerConfig {
            idle_timeout: Duration::from_millis(200),
            reaper_period: Duration::from_millis(50),
            ..ServerConfig::default()
        })
        .await;
        let mut alice = login(addr, "alice", "12345").await;

        // the reaper closes the transport once last_activity goes stale
        let evicted = timeout(Duration::from_secs(2), read_frame(&mut alice)).await;
        assert!(matches!(evicted, Ok(Err(FrameError::Closed))));

        // the slot is free again
        login(addr, "alice", "12345").await;
    }
}
