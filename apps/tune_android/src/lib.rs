//! Tune Android JNI 绑定
//!
//! 提供 `com.tune.service.NativeService` 调用的 JNI 接口。服务在 `bind` 时启动，
//! 控制方法返回状态码：0 成功，负数失败。

use std::sync::{Mutex, MutexGuard, PoisonError};

use jni::objects::{JClass, JObjectArray, JString};
use jni::sys::{jint, jlong, jstring};
use jni::JNIEnv;

use tune_player::NativeEngine;
use tune_service::{
    Broadcaster, LogReceiver, Playlist, ServiceBuilder, ServiceConfig, ServiceConnection,
    ServiceError,
};

/// 状态码
const OK: jint = 0;
const ERR_NOT_BOUND: jint = -1;
const ERR_DISCONNECTED: jint = -2;
const ERR_BAD_ARGUMENT: jint = -3;
const ERR_CONFIG: jint = -4;
const ERR_SERVICE: jint = -5;

static CONNECTION: Mutex<ServiceConnection> = Mutex::new(ServiceConnection::new());

fn connection() -> MutexGuard<'static, ServiceConnection> {
    CONNECTION.lock().unwrap_or_else(PoisonError::into_inner)
}

fn status(result: Result<(), ServiceError>) -> jint {
    match result {
        Ok(()) => OK,
        Err(e) => {
            log::warn!("command failed: {}", e);
            match e {
                ServiceError::NotBound => ERR_NOT_BOUND,
                ServiceError::Disconnected => ERR_DISCONNECTED,
                ServiceError::Playlist(_) => ERR_BAD_ARGUMENT,
                ServiceError::Config(_) => ERR_CONFIG,
                _ => ERR_SERVICE,
            }
        }
    }
}

/// 初始化日志（Android）
#[cfg(target_os = "android")]
fn init_logging(tag: &str) {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Debug)
            .with_tag(tag),
    );
}

#[cfg(not(target_os = "android"))]
fn init_logging(_tag: &str) {}

/// JNI: 初始化库
#[no_mangle]
pub extern "system" fn Java_com_tune_service_NativeService_init(_env: JNIEnv, _class: JClass) {
    init_logging(&ServiceConfig::default().log_tag);
}

/// JNI: 启动并绑定播放服务
///
/// @param configJson 服务配置 JSON，可为 null
/// @return 0 成功，负数失败
#[no_mangle]
pub extern "system" fn Java_com_tune_service_NativeService_bind<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    config_json: JString<'local>,
) -> jint {
    let config = if config_json.is_null() {
        ServiceConfig::default()
    } else {
        let json: String = match env.get_string(&config_json) {
            Ok(s) => s.into(),
            Err(_) => return ERR_BAD_ARGUMENT,
        };
        match ServiceConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => return status(Err(e)),
        }
    };
    init_logging(&config.log_tag);
    status(bind_impl(config))
}

fn bind_impl(config: ServiceConfig) -> Result<(), ServiceError> {
    let player_config = config.player_config();
    let handle = ServiceBuilder::new(config)
        .observer(Broadcaster::new().with_receiver(LogReceiver))
        .spawn(move |notice_tx| NativeEngine::new(player_config, notice_tx))?;

    // 重复绑定时关闭旧服务
    let previous = connection().bind(handle);
    if let Some(previous) = previous {
        log::info!("replacing bound service");
        previous.shutdown()?;
    }
    Ok(())
}

/// JNI: 解除绑定并关闭服务
#[no_mangle]
pub extern "system" fn Java_com_tune_service_NativeService_unbind(
    _env: JNIEnv,
    _class: JClass,
) -> jint {
    let handle = connection().unbind();
    match handle {
        Some(handle) => status(handle.shutdown()),
        None => ERR_NOT_BOUND,
    }
}

/// JNI: 替换播放列表并从第一首开始
///
/// @param locators 文件路径或 http(s) 地址
/// @return 0 成功，负数失败
#[no_mangle]
pub extern "system" fn Java_com_tune_service_NativeService_start<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    locators: JObjectArray<'local>,
) -> jint {
    let items = match read_string_array(&mut env, &locators) {
        Some(items) => items,
        None => return ERR_BAD_ARGUMENT,
    };
    let playlist = match Playlist::parse(&items) {
        Ok(playlist) => playlist,
        Err(e) => return status(Err(e.into())),
    };
    status(connection().start(playlist))
}

fn read_string_array(env: &mut JNIEnv<'_>, array: &JObjectArray<'_>) -> Option<Vec<String>> {
    if array.is_null() {
        return None;
    }
    let len = env.get_array_length(array).ok()?;
    let mut items = Vec::with_capacity(len as usize);
    for i in 0..len {
        let element = env.get_object_array_element(array, i).ok()?;
        let element = JString::from(element);
        let item: String = env.get_string(&element).ok()?.into();
        items.push(item);
    }
    Some(items)
}

#[no_mangle]
pub extern "system" fn Java_com_tune_service_NativeService_play(
    _env: JNIEnv,
    _class: JClass,
) -> jint {
    status(connection().play())
}

#[no_mangle]
pub extern "system" fn Java_com_tune_service_NativeService_pause(
    _env: JNIEnv,
    _class: JClass,
) -> jint {
    status(connection().pause())
}

#[no_mangle]
pub extern "system" fn Java_com_tune_service_NativeService_resume(
    _env: JNIEnv,
    _class: JClass,
) -> jint {
    status(connection().resume())
}

#[no_mangle]
pub extern "system" fn Java_com_tune_service_NativeService_next(
    _env: JNIEnv,
    _class: JClass,
) -> jint {
    status(connection().next())
}

#[no_mangle]
pub extern "system" fn Java_com_tune_service_NativeService_previous(
    _env: JNIEnv,
    _class: JClass,
) -> jint {
    status(connection().previous())
}

/// JNI: 跳转
///
/// @param positionMs 目标位置（毫秒），负数无效
#[no_mangle]
pub extern "system" fn Java_com_tune_service_NativeService_seekTo(
    _env: JNIEnv,
    _class: JClass,
    position_ms: jlong,
) -> jint {
    let Ok(position_ms) = u64::try_from(position_ms) else {
        return ERR_BAD_ARGUMENT;
    };
    status(connection().seek_to(position_ms))
}

#[no_mangle]
pub extern "system" fn Java_com_tune_service_NativeService_restart(
    _env: JNIEnv,
    _class: JClass,
) -> jint {
    status(connection().restart())
}

#[no_mangle]
pub extern "system" fn Java_com_tune_service_NativeService_stop(
    _env: JNIEnv,
    _class: JClass,
) -> jint {
    status(connection().stop())
}

/// JNI: 取出下一个服务事件
///
/// @return 事件 JSON（`{"type": ..., "data": ...}`）；没有事件或未绑定时返回 null
#[no_mangle]
pub extern "system" fn Java_com_tune_service_NativeService_pollEvent<'local>(
    env: JNIEnv<'local>,
    _class: JClass<'local>,
) -> jstring {
    let event = connection().try_event();
    let Some(json) = event.and_then(|event| serde_json::to_string(&event).ok()) else {
        return std::ptr::null_mut();
    };
    match env.new_string(json) {
        Ok(s) => s.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}
