use std::fs;
use std::net::TcpStream;
use std::sync::Arc;

use fastlink::codec::Message;
use fastlink::demo::{demo_service, Raw, Text};

use crate::cmd::{parse_duration, CodecArgs, SendArgs};
use crate::exit::{codec_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat, Received};

/// Handler context for echoed messages: prints them.
struct Printer {
    peer: String,
    format: OutputFormat,
    printed: usize,
}

impl Printer {
    fn print(&mut self, message: &dyn Message, payload: &[u8]) {
        print_message(
            &Received {
                service: message.service_id(),
                message: message.message_id(),
                payload,
                peer: &self.peer,
            },
            self.format,
        );
        self.printed += 1;
    }
}

pub fn run(args: SendArgs, codec_args: &CodecArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let message = resolve_message(&args)?;

    let mut codec = codec_args.build::<Printer>()?;
    codec.register(demo_service(
        |printer: &mut Printer, msg: Text| printer.print(&msg, msg.text.as_bytes()),
        |printer: &mut Printer, msg: Raw| printer.print(&msg, &msg.data),
    ));
    let codec = Arc::new(codec);

    let stream =
        TcpStream::connect(&args.addr).map_err(|err| io_error("connect failed", err))?;
    let writer = stream
        .try_clone()
        .map_err(|err| io_error("connect failed", err))?;

    let mut encoder = codec.new_encoder(writer);
    encoder
        .encode(message.as_ref())
        .map_err(|err| codec_error("send failed", err))?;
    tracing::debug!(
        addr = %args.addr,
        service = message.service_id(),
        message = message.message_id(),
        size = message.binary_size(),
        "sent message"
    );

    if args.wait {
        stream
            .set_read_timeout(Some(wait_timeout))
            .map_err(|err| io_error("receive failed", err))?;
        let mut decoder = codec.new_decoder(stream);
        let request = decoder
            .decode()
            .map_err(|err| codec_error("receive failed", err))?;

        let mut printer = Printer {
            peer: args.addr.clone(),
            format,
            printed: 0,
        };
        request.process(&mut printer);
        if printer.printed == 0 {
            return Err(CliError::new(
                crate::exit::PROTOCOL_ERROR,
                "echoed message was not handled",
            ));
        }
    }

    Ok(SUCCESS)
}

fn resolve_message(args: &SendArgs) -> CliResult<Box<dyn Message>> {
    if let Some(text) = &args.text {
        return Ok(Box::new(Text::new(text.as_str())));
    }
    if let Some(hex) = &args.hex {
        return Ok(Box::new(Raw::new(parse_hex(hex)?)));
    }
    if let Some(path) = &args.file {
        let data = fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        return Ok(Box::new(Raw::new(data)));
    }
    Err(CliError::new(USAGE, "one of --text, --hex or --file is required"))
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "--hex needs an even number of digits"));
    }

    digits
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).unwrap_or("");
            u8::from_str_radix(pair, 16)
                .map_err(|_| CliError::new(USAGE, format!("invalid hex byte: {pair:?}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_accepts_spaced_digits() {
        assert_eq!(parse_hex("01 02 ff").unwrap(), vec![0x01, 0x02, 0xFF]);
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn parse_hex_rejects_bad_input() {
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }

    fn send_args(text: Option<&str>, hex: Option<&str>) -> SendArgs {
        SendArgs {
            addr: "127.0.0.1:1".to_string(),
            text: text.map(str::to_string),
            hex: hex.map(str::to_string),
            file: None,
            wait: false,
            wait_timeout: "5s".to_string(),
        }
    }

    #[test]
    fn resolves_text_and_raw_messages() {
        let text = resolve_message(&send_args(Some("hi"), None)).unwrap();
        assert_eq!((text.service_id(), text.message_id()), (1, 1));

        let raw = resolve_message(&send_args(None, Some("010203"))).unwrap();
        assert_eq!(raw.message_id(), 2);
        assert_eq!(raw.downcast_ref::<Raw>().unwrap().data, vec![1, 2, 3]);
    }

    #[test]
    fn missing_payload_is_usage_error() {
        let err = resolve_message(&send_args(None, None)).err().expect("must fail");
        assert_eq!(err.code, USAGE);
    }
}
