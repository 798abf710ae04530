use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use fastlink::codec::{Codec, CodecError, Encoder, Message};
use fastlink::demo::{demo_service, Raw, Text};

use crate::cmd::{parse_duration, CodecArgs, EchoArgs};
use crate::exit::{io_error, CliError, CliResult, SUCCESS};

/// Per-connection handler context: replies go out through the encoder.
pub struct EchoSession<W: Write> {
    peer: String,
    encoder: Encoder<W>,
    echoed: u64,
    error: Option<CodecError>,
}

impl<W: Write> EchoSession<W> {
    pub fn new(peer: impl Into<String>, encoder: Encoder<W>) -> Self {
        Self {
            peer: peer.into(),
            encoder,
            echoed: 0,
            error: None,
        }
    }

    fn reply(&mut self, message: &dyn Message) {
        tracing::info!(
            peer = %self.peer,
            service = message.service_id(),
            message = message.message_id(),
            size = message.binary_size(),
            "echoing message"
        );
        match self.encoder.encode(message) {
            Ok(()) => self.echoed += 1,
            Err(err) => self.error = Some(err),
        }
    }

    /// Error raised by the last reply, if any.
    pub fn take_error(&mut self) -> Option<CodecError> {
        self.error.take()
    }

    pub fn echoed(&self) -> u64 {
        self.echoed
    }
}

pub fn echo_codec<W>(args: &CodecArgs) -> CliResult<Codec<EchoSession<W>>>
where
    W: Write + Send + 'static,
{
    let mut codec = args.build()?;
    codec.register(demo_service(
        |session: &mut EchoSession<W>, msg: Text| session.reply(&msg),
        |session: &mut EchoSession<W>, msg: Raw| session.reply(&msg),
    ));
    Ok(codec)
}

pub fn run(args: EchoArgs, codec_args: &CodecArgs) -> CliResult<i32> {
    let idle_timeout = args
        .idle_timeout
        .as_deref()
        .map(parse_duration)
        .transpose()?;
    let codec = Arc::new(echo_codec::<TcpStream>(codec_args)?);

    let listener = TcpListener::bind(&args.addr).map_err(|err| io_error("bind failed", err))?;
    let local = listener
        .local_addr()
        .map_err(|err| io_error("bind failed", err))?;
    tracing::info!(addr = %local, read_buffer_size = codec.config().read_buffer_size, "echo server listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let next_peer_id = AtomicU64::new(1);
    let mut workers = Vec::new();
    let mut accepted = 0usize;

    for stream in listener.incoming() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let stream = stream.map_err(|err| io_error("accept failed", err))?;
        let peer = format!("peer-{}", next_peer_id.fetch_add(1, Ordering::Relaxed));
        let codec = Arc::clone(&codec);

        let worker = thread::Builder::new()
            .name(peer.clone())
            .spawn(move || {
                match serve_connection(&codec, stream, &peer, idle_timeout) {
                    Ok(echoed) => tracing::info!(peer = %peer, echoed, "connection closed"),
                    Err(err) => tracing::warn!(peer = %peer, error = %err, "connection dropped"),
                }
            })
            .map_err(|err| io_error("spawn failed", err))?;
        reap_finished(&mut workers);
        workers.push(worker);
        accepted += 1;

        if args.max_connections.is_some_and(|max| accepted >= max) {
            break;
        }
    }

    for worker in workers {
        let _ = worker.join();
    }
    Ok(SUCCESS)
}

/// Decode and echo frames until the peer disconnects.
///
/// Returns the number of echoed messages.
pub fn serve_connection(
    codec: &Arc<Codec<EchoSession<TcpStream>>>,
    stream: TcpStream,
    peer: &str,
    idle_timeout: Option<Duration>,
) -> Result<u64, CodecError> {
    stream.set_read_timeout(idle_timeout)?;
    let writer = stream.try_clone()?;

    let mut session = EchoSession::new(peer, codec.new_encoder(writer));
    let mut decoder = codec.new_decoder(stream);

    loop {
        let request = match decoder.decode() {
            Ok(request) => request,
            Err(CodecError::ConnectionClosed) => break,
            Err(err) => return Err(err),
        };
        request.process(&mut session);
        if let Some(err) = session.take_error() {
            return Err(err);
        }
    }

    decoder.dispose();
    Ok(session.echoed())
}

/// Join connection threads that have already exited.
fn reap_finished(workers: &mut Vec<JoinHandle<()>>) {
    let mut i = 0;
    while i < workers.len() {
        if workers[i].is_finished() {
            let _ = workers.swap_remove(i).join();
        } else {
            i += 1;
        }
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::mpsc;

    use super::*;

    fn codec_args() -> CodecArgs {
        CodecArgs {
            read_buffer_size: 64,
            pooled_buffers: true,
        }
    }

    #[test]
    fn session_echoes_decoded_messages() {
        let codec = Arc::new(echo_codec::<Vec<u8>>(&codec_args()).unwrap());

        let mut client = codec.new_encoder(Vec::new());
        client.encode(&Text::new("ping")).unwrap();
        client.encode(&Raw::new(vec![1, 2, 3])).unwrap();
        let wire = client.into_inner();

        let mut session = EchoSession::new("peer-test", codec.new_encoder(Vec::new()));
        let mut decoder = codec.new_decoder(Cursor::new(wire.clone()));
        decoder.decode().unwrap().process(&mut session);
        decoder.decode().unwrap().process(&mut session);

        assert!(session.take_error().is_none());
        assert_eq!(session.echoed(), 2);
        assert_eq!(session.encoder.get_ref(), &wire);
    }

    #[test]
    fn serve_connection_over_tcp() {
        let codec = Arc::new(echo_codec::<TcpStream>(&codec_args()).unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = {
            let codec = Arc::clone(&codec);
            thread::spawn(move || {
                let (stream, _) = listener.accept().unwrap();
                serve_connection(&codec, stream, "peer-1", Some(Duration::from_secs(5)))
            })
        };

        let stream = TcpStream::connect(addr).unwrap();
        let client = Arc::new(echo_codec::<TcpStream>(&codec_args()).unwrap());
        let mut enc = client.new_encoder(stream.try_clone().unwrap());
        let mut dec = client.new_decoder(stream.try_clone().unwrap());

        enc.encode(&Text::new("over tcp")).unwrap();
        let request = dec.decode().unwrap();
        assert_eq!(
            request.message().downcast_ref::<Text>().unwrap().text,
            "over tcp"
        );

        stream.shutdown(std::net::Shutdown::Both).unwrap();
        drop(enc);
        drop(dec);
        assert_eq!(server.join().unwrap().unwrap(), 1);
    }

    #[test]
    fn finished_workers_are_reaped() {
        let (release, wait) = mpsc::channel::<()>();
        let mut workers: Vec<JoinHandle<()>> = (0..3).map(|_| thread::spawn(|| {})).collect();
        workers.push(thread::spawn(move || {
            let _ = wait.recv();
        }));

        let start = std::time::Instant::now();
        while workers[..3].iter().any(|w| !w.is_finished()) {
            assert!(start.elapsed() < Duration::from_secs(5), "workers did not finish");
            thread::sleep(Duration::from_millis(5));
        }

        reap_finished(&mut workers);
        assert_eq!(workers.len(), 1);

        release.send(()).unwrap();
        for worker in workers {
            worker.join().unwrap();
        }
    }
}
