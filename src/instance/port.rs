use std::io;
use std::net::TcpListener;

/// Bind port 0 and report what the OS picked. The listener is closed before returning, so the
/// port is only "probably" free; the pool still guards against handing it out twice.
pub(super) fn pick_free_port(ip: &str) -> io::Result<u16> {
    let listener = TcpListener::bind((ip, 0))?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_a_bindable_port() {
        let port = pick_free_port("127.0.0.1").unwrap();
        assert_ne!(port, 0);
        TcpListener::bind(("127.0.0.1", port)).expect("picked port should be bindable");
    }

    #[test]
    fn rejects_unparseable_ip() {
        assert!(pick_free_port("not an ip").is_err());
    }
}
