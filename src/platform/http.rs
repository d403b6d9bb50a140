//! Range requests over the ESP-IDF HTTP client

use std::io;
use std::time::Duration;

use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
use esp_idf_svc::http::Method;

use epd_photo_frame::download::{ChunkRange, DownloadError, RangeClient, RangeResponse};

/// Opens a new connection for every range request
pub struct EspRangeClient {
    timeout: Duration,
}

impl EspRangeClient {
    pub fn new(timeout: Duration) -> Self {
        EspRangeClient { timeout }
    }
}

/// Response body, owns the connection it reads from
pub struct EspBody {
    conn: EspHttpConnection,
}

impl io::Read for EspBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.conn
            .read(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

impl RangeClient for EspRangeClient {
    type Body<'a> = EspBody where Self: 'a;

    fn get_range(
        &mut self,
        url: &str,
        range: &ChunkRange,
    ) -> Result<RangeResponse<EspBody>, DownloadError> {
        let config = Configuration {
            timeout: Some(self.timeout),
            buffer_size: Some(4096),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let mut conn = EspHttpConnection::new(&config)
            .map_err(|e| DownloadError::ConnectionInit(e.to_string()))?;

        let header = range.header_value();
        conn.initiate_request(Method::Get, url, &[("Range", header.as_str())])
            .map_err(|e| DownloadError::Connect(e.to_string()))?;
        conn.initiate_response()
            .map_err(|e| DownloadError::Connect(e.to_string()))?;

        let status = conn.status();
        log::debug!("GET {} ({}) -> {}", url, header, status);

        Ok(RangeResponse {
            status,
            body: EspBody { conn },
        })
    }
}
