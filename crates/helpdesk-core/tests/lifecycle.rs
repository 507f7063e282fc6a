use helpdesk_core::{
    AppendMessage, Author, Category, Config, Error, ErrorKind, JsonlRepository, MemoryRepository,
    NewTicket, Priority, QueryEngine, Requester, Status, TicketFilter, TicketStore,
};
use std::sync::Arc;
use std::thread;

fn john() -> Requester {
    Requester {
        id: "1".to_string(),
        name: "John Doe".to_string(),
        email: "john@example.com".to_string(),
    }
}

fn mike() -> Author {
    Author {
        id: "staff-2".to_string(),
        name: "Mike Tech".to_string(),
        avatar: Some("avatars/mike.png".to_string()),
    }
}

fn ftp_ticket() -> NewTicket {
    NewTicket {
        subject: "FTP issue".to_string(),
        description: "I need to upload files but don't know how to set up FTP access.".to_string(),
        category: Category::Technical,
        priority: Some(Priority::Low),
        requester: john(),
    }
}

#[test]
fn ftp_conversation_round() {
    let store = TicketStore::open(MemoryRepository::new(), Config::default()).unwrap();

    let ticket = store.create_ticket(ftp_ticket()).unwrap();
    assert_eq!(ticket.status, Status::Open);
    assert_eq!(ticket.messages.len(), 1);

    store
        .append_message(
            &ticket.id,
            AppendMessage::staff(mike(), "Your FTP credentials are in the Game Panel."),
        )
        .unwrap();
    let t = store.get_ticket(&ticket.id).unwrap();
    assert_eq!(t.status, Status::Answered);
    assert_eq!(t.messages.len(), 2);

    store
        .append_message(
            &ticket.id,
            AppendMessage::requester(Author::from(&john()), "Could I get the step-by-step guide?"),
        )
        .unwrap();
    let t = store.get_ticket(&ticket.id).unwrap();
    assert_eq!(t.status, Status::Waiting);
    assert_eq!(t.messages.len(), 3);

    let closed = store.close(&ticket.id).unwrap();
    assert_eq!(closed.status, Status::Closed);

    let err = store
        .append_message(
            &ticket.id,
            AppendMessage::requester(Author::from(&john()), "One more thing"),
        )
        .unwrap_err();
    assert!(matches!(err, Error::ClosedTicket(_)));

    let t = store.get_ticket(&ticket.id).unwrap();
    assert_eq!(t.status, Status::Closed);
    assert_eq!(t.messages.len(), 3);
    assert!(t.updated_at >= t.created_at);
    assert!(t.messages.windows(2).all(|w| w[0].created_at <= w[1].created_at));
}

#[test]
fn concurrent_appends_are_serialized() {
    let store = Arc::new(TicketStore::open(MemoryRepository::new(), Config::default()).unwrap());
    let ticket = store.create_ticket(ftp_ticket()).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let store = Arc::clone(&store);
            let id = ticket.id.clone();
            thread::spawn(move || {
                for i in 0..25 {
                    let msg = if (n + i) % 2 == 0 {
                        AppendMessage::staff(mike(), format!("staff {n}/{i}"))
                    } else {
                        AppendMessage::requester(Author::from(&john()), format!("user {n}/{i}"))
                    };
                    store.append_message(&id, msg).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let t = store.get_ticket(&ticket.id).unwrap();
    assert_eq!(t.messages.len(), 1 + 8 * 25);

    // Ids follow thread position, so no append was lost or duplicated
    for (i, msg) in t.messages.iter().enumerate() {
        assert_eq!(msg.id, format!("msg-{}", i + 1));
    }
    assert!(t.messages.windows(2).all(|w| w[0].created_at <= w[1].created_at));

    // Replaying the thread through the transition table yields the stored status
    let replayed = t
        .messages
        .iter()
        .skip(1)
        .fold(Status::Open, |s, m| s.after_append(m.is_staff));
    assert_eq!(t.status, replayed);
}

#[test]
fn concurrent_creates_get_distinct_ids() {
    let store = Arc::new(TicketStore::open(MemoryRepository::new(), Config::default()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..10)
                    .map(|_| store.create_ticket(ftp_ticket()).unwrap().id)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids: Vec<String> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 40);
    assert_eq!(ids.first().map(String::as_str), Some("TKT-001"));
    assert_eq!(ids.last().map(String::as_str), Some("TKT-040"));
}

#[test]
fn jsonl_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let repo = JsonlRepository::init(dir.path(), "SUP").unwrap();
    let config = repo.config().unwrap();
    let store = TicketStore::open(repo, config).unwrap();

    let ticket = store.create_ticket(ftp_ticket()).unwrap();
    assert_eq!(ticket.id, "SUP-001");
    store
        .append_message(&ticket.id, AppendMessage::staff(mike(), "Check the panel"))
        .unwrap();
    store.close(&ticket.id).unwrap();
    store.rate(&ticket.id, 5).unwrap();
    drop(store);

    let repo = JsonlRepository::open_at(dir.path()).unwrap();
    let config = repo.config().unwrap();
    let store = Arc::new(TicketStore::open(repo, config).unwrap());
    let t = store.get_ticket("SUP-001").unwrap();
    assert_eq!(t.status, Status::Closed);
    assert_eq!(t.messages.len(), 2);
    assert_eq!(t.rating, Some(5));

    let next = store.create_ticket(ftp_ticket()).unwrap();
    assert_eq!(next.id, "SUP-002");

    let engine = QueryEngine::new(store);
    let open = engine.list(&TicketFilter::needs_attention());
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, "SUP-002");
    assert_eq!(engine.stats(chrono::Utc::now()).satisfaction_rate, Some(100.0));
}

#[test]
fn two_jsonl_stores_on_one_directory() {
    let dir = tempfile::tempdir().unwrap();
    JsonlRepository::init(dir.path(), "TKT").unwrap();
    let open = || {
        let repo = JsonlRepository::open_at(dir.path()).unwrap();
        let config = repo.config().unwrap();
        TicketStore::open(repo, config).unwrap()
    };
    let desk = open();
    let portal = open();

    let first = desk.create_ticket(ftp_ticket()).unwrap();
    assert_eq!(first.id, "TKT-001");

    // The portal still thinks TKT-001 is free; it must not clobber it
    let err = portal.create_ticket(ftp_ticket()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let second = portal.create_ticket(ftp_ticket()).unwrap();
    assert_eq!(second.id, "TKT-002");

    desk.append_message(&first.id, AppendMessage::staff(mike(), "Check the panel"))
        .unwrap();

    let reopened = open();
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened.get_ticket("TKT-001").unwrap().status, Status::Answered);
    assert_eq!(reopened.get_ticket("TKT-002").unwrap().status, Status::Open);
}
