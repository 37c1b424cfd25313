//! Node.js side of the Playwright driver.
//!
//! The script is passed to `node -e` with the launch configuration as JSON in
//! `argv[1]`. It reads one request per stdin line and writes one message per
//! stdout line:
//!
//! - `{"type":"ready"}` once the browser context and first page exist,
//! - `{"type":"response","id":N,"ok":true,"value":...}` or
//!   `{"type":"response","id":N,"ok":false,"error":"...","kind":"..."}`,
//! - `{"type":"event","event":"navigated","url":"..."}`,
//!   `{"type":"event","event":"closed"}`,
//!   `{"type":"event","event":"download_cancelled","suggested_filename":"..."}`.
//!
//! Diagnostics go to stderr.
//!
//! Once the automated flow is armed, losing the whole browser does not end the
//! driver. It emits `closed` and relaunches Chromium with the storage state
//! captured after sign-in, then reopens the last URL. Requests arriving
//! meanwhile fail with kind `page_closed`. Before sign-in a disconnect emits
//! `closed` and exits.

/// Attribute the snapshot function stamps on every captured element.
pub const HANDLE_ATTRIBUTE: &str = "data-ocikey-handle";

pub const DRIVER_SCRIPT: &str = r#"
'use strict';
const readline = require('readline');

const config = JSON.parse(process.argv[1] || '{}');
const { chromium } = require(config.playwright_module || 'playwright');

const HANDLE_ATTRIBUTE = 'data-ocikey-handle';

let browser = null;
let context = null;
let page = null;
let automated = false;
let shuttingDown = false;
let relaunching = false;
let signedInState = null;
let lastUrl = null;
let windowVisible = true;
let snapshotSequence = 0;

function emit(message) {
  process.stdout.write(JSON.stringify(message) + '\n');
}

function log(...parts) {
  console.error('[ocikey-driver]', ...parts);
}

class DriverError extends Error {
  constructor(kind, message) {
    super(message);
    this.kind = kind;
  }
}

function classify(error) {
  if (error instanceof DriverError) return error.kind;
  if (relaunching) return 'page_closed';
  const message = String((error && error.message) || error);
  if (!browser || !browser.isConnected()) return 'session';
  if (!page || page.isClosed() || /has been closed/i.test(message)) return 'page_closed';
  if (/context was destroyed|navigat|frame was detached|ERR_ABORTED/i.test(message)) return 'navigating';
  return 'evaluation';
}

function attachPage(next) {
  page = next;
  next.on('framenavigated', (frame) => {
    if (frame === next.mainFrame()) {
      lastUrl = frame.url();
      emit({ type: 'event', event: 'navigated', url: frame.url() });
    }
  });
  next.on('download', async (download) => {
    if (!automated) return;
    const suggested = download.suggestedFilename();
    try {
      await download.cancel();
    } catch (error) {
      log('download cancel failed', String(error));
    }
    emit({ type: 'event', event: 'download_cancelled', suggested_filename: suggested });
  });
  next.on('close', async () => {
    if (shuttingDown || relaunching || page !== next) return;
    emit({ type: 'event', event: 'closed' });
    if (automated && context && browser && browser.isConnected()) {
      try {
        attachPage(await context.newPage());
        log('reopened page in the same browsing context');
      } catch (error) {
        log('failed to reopen page', String(error));
      }
    }
  });
}

function requirePage() {
  if (relaunching) throw new DriverError('page_closed', 'browser is relaunching');
  if (!browser || !browser.isConnected()) throw new DriverError('session', 'browser is not running');
  if (!page || page.isClosed()) throw new DriverError('page_closed', 'page is closed');
  return page;
}

function resolveFrames(target) {
  const current = requirePage();
  const main = current.mainFrame();
  if (target && target.kind === 'prefer_embedded') {
    const embedded = current.frames().find((frame) => frame !== main && frame.url().includes(target.url_fragment));
    return [embedded || main];
  }
  return [main, ...current.frames().filter((frame) => frame !== main)];
}

function snapshotDocument({ selector, prefix, handleAttribute }) {
  const candidates = Array.from(document.querySelectorAll(selector + ', label'));
  let counter = 0;
  const trimmed = (node) => (node && node.textContent ? node.textContent.trim() : '');
  return {
    frame_url: location.href,
    elements: candidates.map((element) => {
      let handle = element.getAttribute(handleAttribute);
      if (!handle) {
        handle = prefix + '-' + counter++;
        element.setAttribute(handleAttribute, handle);
      }
      const attributes = {};
      for (const attribute of Array.from(element.attributes)) {
        if (attribute.name !== handleAttribute) attributes[attribute.name] = attribute.value;
      }
      let label = null;
      if (element.tagName !== 'LABEL') {
        label = element.closest('label');
        if (!label && element.id) {
          label = document.querySelector('label[for="' + CSS.escape(element.id) + '"]');
        }
      }
      const ancestorTestIds = [];
      for (let node = element.parentElement; node; node = node.parentElement) {
        const testId = node.getAttribute('data-test-id');
        if (testId) ancestorTestIds.push(testId);
      }
      return {
        handle,
        tag: element.tagName.toLowerCase(),
        attributes,
        text: trimmed(element),
        value: typeof element.value === 'string' ? element.value : null,
        label_text: label ? trimmed(label) : null,
        ancestor_test_ids: ancestorTestIds,
        visible: element.offsetParent !== null,
        disabled: !!element.disabled,
        checked: !!element.checked,
      };
    }),
  };
}

function actOnHandle({ handle, op, text, handleAttribute }) {
  const element = document.querySelector('[' + handleAttribute + '="' + handle + '"]');
  if (!element) return false;
  if (op === 'click') {
    element.click();
    return true;
  }
  if (op === 'select_radio') {
    element.click();
    element.dispatchEvent(new MouseEvent('mousedown', { bubbles: true }));
    element.dispatchEvent(new MouseEvent('mouseup', { bubbles: true }));
    element.checked = true;
    element.dispatchEvent(new Event('change', { bubbles: true }));
    return element.checked;
  }
  if (op === 'fill_text') {
    element.value = text;
    element.dispatchEvent(new Event('input', { bubbles: true }));
    element.dispatchEvent(new Event('change', { bubbles: true }));
    return true;
  }
  return false;
}

function removeSpinners(selectors) {
  let removed = 0;
  for (const selector of selectors) {
    for (const node of Array.from(document.querySelectorAll(selector))) {
      if (node.parentNode) {
        node.parentNode.removeChild(node);
        removed++;
      }
    }
  }
  return removed;
}

async function runQuery(query) {
  switch (query.op) {
    case 'current_url':
      return requirePage().url();
    case 'snapshot': {
      const frames = resolveFrames(query.target);
      const snapshots = [];
      for (const frame of frames) {
        snapshotSequence += 1;
        const argument = { selector: query.selector, prefix: 's' + snapshotSequence, handleAttribute: HANDLE_ATTRIBUTE };
        try {
          snapshots.push(await frame.evaluate(snapshotDocument, argument));
        } catch (error) {
          if (frames.length === 1) throw error;
          log('skipping frame', frame.url(), String(error));
        }
      }
      return snapshots;
    }
    case 'click':
    case 'select_radio':
    case 'fill_text': {
      const argument = { handle: query.handle, op: query.op, text: query.text || '', handleAttribute: HANDLE_ATTRIBUTE };
      for (const frame of resolveFrames(query.target)) {
        try {
          if (await frame.evaluate(actOnHandle, argument)) return true;
        } catch (error) {
          log('action failed in frame', frame.url(), String(error));
        }
      }
      throw new DriverError('stale_handle', query.handle);
    }
    case 'remove_spinners': {
      let removed = 0;
      for (const frame of resolveFrames({ kind: 'all_frames' })) {
        try {
          removed += await frame.evaluate(removeSpinners, query.selectors);
        } catch (error) {
          log('spinner cleanup skipped frame', frame.url(), String(error));
        }
      }
      return removed;
    }
    default:
      throw new DriverError('evaluation', 'unknown query op ' + query.op);
  }
}

async function setWindowVisible(visible) {
  const current = requirePage();
  const cdp = await context.newCDPSession(current);
  try {
    const { windowId } = await cdp.send('Browser.getWindowForTarget');
    await cdp.send('Browser.setWindowBounds', {
      windowId,
      bounds: { windowState: visible ? 'normal' : 'minimized' },
    });
  } finally {
    await cdp.detach().catch(() => {});
  }
  windowVisible = visible;
  return visible;
}

async function captureSignedInState() {
  try {
    signedInState = await context.storageState();
  } catch (error) {
    log('storage state capture failed', String(error));
  }
}

async function launchBrowser() {
  browser = await chromium.launch({ headless: !!config.headless });
  browser.on('disconnected', onDisconnected);
  context = await browser.newContext({
    acceptDownloads: true,
    viewport: null,
    storageState: signedInState || undefined,
  });
  if (!signedInState) await context.clearCookies();
  attachPage(await context.newPage());
}

async function relaunch() {
  await launchBrowser();
  relaunching = false;
  if (!windowVisible) {
    await setWindowVisible(false).catch((error) => log('re-hiding window failed', String(error)));
  }
  if (lastUrl) {
    await page.goto(lastUrl, { waitUntil: 'commit' }).catch((error) => log('restore navigation', String(error)));
  }
}

function onDisconnected() {
  if (shuttingDown || relaunching) return;
  emit({ type: 'event', event: 'closed' });
  if (!automated) {
    process.exit(0);
    return;
  }
  relaunching = true;
  log('browser closed after sign-in; relaunching with the signed-in state');
  relaunch().catch((error) => {
    log('relaunch failed', String((error && error.stack) || error));
    process.exit(3);
  });
}

async function shutdown() {
  shuttingDown = true;
  if (context) {
    await context.clearCookies().catch(() => {});
    await context.close().catch(() => {});
  }
  if (browser) await browser.close().catch(() => {});
}

async function handle(command) {
  switch (command.name) {
    case 'navigate':
      await requirePage().goto(command.url, { waitUntil: 'commit' });
      if (automated) await captureSignedInState();
      return null;
    case 'query':
      return runQuery(command.query);
    case 'set_window_visible':
      return setWindowVisible(!!command.visible);
    case 'set_automated_flow':
      automated = !!command.enabled;
      if (automated) await captureSignedInState();
      return automated;
    case 'shutdown':
      await shutdown();
      return null;
    default:
      throw new DriverError('evaluation', 'unknown command ' + command.name);
  }
}

async function main() {
  await launchBrowser();
  emit({ type: 'ready' });
  if (config.start_url) {
    page.goto(config.start_url, { waitUntil: 'commit' }).catch((error) => log('initial navigation', String(error)));
  }

  const lines = readline.createInterface({ input: process.stdin });
  lines.on('line', async (line) => {
    if (!line.trim()) return;
    let request;
    try {
      request = JSON.parse(line);
    } catch (error) {
      log('unparseable request', String(error));
      return;
    }
    try {
      const value = await handle(request.command || {});
      emit({ type: 'response', id: request.id, ok: true, value: value === undefined ? null : value });
      if (request.command && request.command.name === 'shutdown') process.exit(0);
    } catch (error) {
      emit({ type: 'response', id: request.id, ok: false, error: String((error && error.message) || error), kind: classify(error) });
    }
  });
  lines.on('close', async () => {
    await shutdown();
    process.exit(0);
  });
}

main().catch((error) => {
  log('driver failed to start', String((error && error.stack) || error));
  process.exit(2);
});
"#;
