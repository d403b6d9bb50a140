use anyhow::{anyhow, Context, Result};
use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use log::{info, warn};

const CONNECT_ATTEMPTS: u32 = 3;

#[derive(Debug)]
pub struct WifiNetwork<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
    pub auth_method: AuthMethod,
}

impl<'a> WifiNetwork<'a> {
    pub fn new(ssid: &'a str, password: &'a str) -> Self {
        Self {
            ssid,
            password,
            auth_method: if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
        }
    }
}

/// Station mode link kept alive for the life of the frame
pub struct WifiLink {
    wifi: Box<BlockingWifi<EspWifi<'static>>>,
}

impl WifiLink {
    pub fn start(
        modem: Modem,
        sys_loop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> Result<Self> {
        let wifi = Box::new(BlockingWifi::wrap(
            EspWifi::new(modem, sys_loop.clone(), Some(nvs))?,
            sys_loop,
        )?);
        Ok(Self { wifi })
    }

    pub fn connect(&mut self, network: &WifiNetwork) -> Result<()> {
        if network.ssid.is_empty() {
            return Err(anyhow!("No Wi-Fi SSID configured"));
        }

        // Scan first so a missing access point is reported as such
        let visible = self.scan_networks()?;
        info!("Found {} available networks", visible.len());
        if !visible.iter().any(|ssid| ssid == network.ssid) {
            warn!("{} not seen in scan, trying anyway", network.ssid);
        }

        let mut last_err = None;
        for attempt in 1..=CONNECT_ATTEMPTS {
            info!(
                "Connecting to {} (attempt {}/{})",
                network.ssid, attempt, CONNECT_ATTEMPTS
            );
            match self.connect_to_network(network) {
                Ok(()) => {
                    info!("Connected to {}, IP: {}", network.ssid, self.ip()?);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Failed to connect to {}: {}", network.ssid, e);
                    let _ = self.wifi.disconnect();
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("Wi-Fi connect failed")))
    }

    fn scan_networks(&mut self) -> Result<Vec<String>> {
        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
        self.wifi.start()?;

        let ap_infos = self.wifi.scan()?;
        Ok(ap_infos.iter().map(|ap| ap.ssid.as_str().to_owned()).collect())
    }

    fn connect_to_network(&mut self, network: &WifiNetwork) -> Result<()> {
        let wifi_config = Configuration::Client(ClientConfiguration {
            ssid: network
                .ssid
                .try_into()
                .map_err(|_| anyhow!("SSID too long"))?,
            password: network
                .password
                .try_into()
                .map_err(|_| anyhow!("Password too long"))?,
            auth_method: network.auth_method,
            ..Default::default()
        });

        self.wifi.set_configuration(&wifi_config)?;
        self.wifi.connect()?;
        self.wifi.wait_netif_up()?;
        Ok(())
    }

    pub fn ip(&self) -> Result<std::net::Ipv4Addr> {
        let info = self
            .wifi
            .wifi()
            .sta_netif()
            .get_ip_info()
            .context("No IP info")?;
        Ok(info.ip)
    }

    pub fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }
}
