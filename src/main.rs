use dmxpro_driver::common::logger::init_logger;
use dmxpro_driver::common::setting::Settings;
use dmxpro_driver::{DmxPro, SerialPortConnector};
use dotenv::dotenv;
use std::error::Error;

const LOG_TAG: &str = "main";

fn main() -> Result<(), Box<dyn Error>> {
    // 检查 env 文件
    dotenv().ok();

    // 加载 config
    let settings = Settings::get();

    // 设置 logger
    init_logger();
    dmxpro_driver::info!(LOG_TAG, "config loaded, env: {:?}", settings.env.env);
    log::debug!("config: {:?}", settings);

    let mut dmx_settings = settings.dmx.clone();
    if !dmx_settings.dummy {
        let connector = SerialPortConnector::default();
        DmxPro::list_devices(&connector)?;
        if dmx_settings.device_name.is_empty() {
            // no device configured, take the first one found
            dmx_settings.device_name = DmxPro::get_devices_list(&connector)?
                .into_iter()
                .next()
                .ok_or("no serial device found, set dmx.device_name")?;
        }
    } else if dmx_settings.device_name.is_empty() {
        dmx_settings.device_name = String::from("dummy");
    }

    let driver = DmxPro::from_settings(&dmx_settings)?;
    driver.init(dmx_settings.zero_on_init)?;
    if !driver.is_connected() {
        dmxpro_driver::warn!(LOG_TAG, "device {} not connected, retrying once", driver.device_name());
        driver.reconnect();
    }

    let (stop_tx, stop_rx) = crossbeam::channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })?;

    dmxpro_driver::info!(LOG_TAG, "streaming to {}, press ctrl-c to stop", driver.device_name());
    let _ = stop_rx.recv();

    driver.shutdown(dmx_settings.zero_on_shutdown);
    dmxpro_driver::info!(LOG_TAG, "stats: {:?}", driver.stats());
    Ok(())
}
